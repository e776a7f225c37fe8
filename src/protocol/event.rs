//! Asynchronous controller events.
//!
//! Events arrive as [`EventFrame`]s on the multicast group (or a configured
//! unicast port) and are never correlated with a command. Decoding maps the
//! 16-bit frame target onto the address space appropriate for each code and
//! types the payload.

use std::fmt;
use std::net::SocketAddr;

use log::warn;

use crate::addr::{Address, ControllerIdentity, MAX_SYSTEM_VARIABLE};
use crate::codec;
use crate::error::{Result, WireError};
use crate::frame::EventFrame;
use crate::protocol::colour::Colour;

// ---------------------------------------------------------------------------
// Event codes
// ---------------------------------------------------------------------------

pub const EVENT_BUTTON_PRESS: u8 = 0x00;
pub const EVENT_BUTTON_HOLD: u8 = 0x01;
pub const EVENT_ABSOLUTE_INPUT: u8 = 0x02;
pub const EVENT_SCENE_CHANGE: u8 = 0x05;
pub const EVENT_OCCUPANCY: u8 = 0x06;
pub const EVENT_SYSTEM_VARIABLE: u8 = 0x07;
pub const EVENT_COLOUR_CHANGE: u8 = 0x08;
pub const EVENT_PROFILE_CHANGE: u8 = 0x09;
pub const EVENT_GROUP_OCCUPIED: u8 = 0x0A;
pub const EVENT_LEVEL_CHANGE: u8 = 0x0B;

/// Colour-change events have been seen carrying group targets offset by
/// 128 instead of 64.
const COLOUR_GROUP_QUIRK: std::ops::RangeInclusive<u16> = 128..=143;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Event category, used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    ButtonPress,
    ButtonHold,
    AbsoluteInput,
    SceneChange,
    Occupancy,
    SystemVariableChange,
    ColourChange,
    ProfileChange,
    GroupOccupied,
    LevelChange,
}

impl EventType {
    pub const ALL: [EventType; 10] = [
        Self::ButtonPress,
        Self::ButtonHold,
        Self::AbsoluteInput,
        Self::SceneChange,
        Self::Occupancy,
        Self::SystemVariableChange,
        Self::ColourChange,
        Self::ProfileChange,
        Self::GroupOccupied,
        Self::LevelChange,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            EVENT_BUTTON_PRESS => Self::ButtonPress,
            EVENT_BUTTON_HOLD => Self::ButtonHold,
            EVENT_ABSOLUTE_INPUT => Self::AbsoluteInput,
            EVENT_SCENE_CHANGE => Self::SceneChange,
            EVENT_OCCUPANCY => Self::Occupancy,
            EVENT_SYSTEM_VARIABLE => Self::SystemVariableChange,
            EVENT_COLOUR_CHANGE => Self::ColourChange,
            EVENT_PROFILE_CHANGE => Self::ProfileChange,
            EVENT_GROUP_OCCUPIED => Self::GroupOccupied,
            EVENT_LEVEL_CHANGE => Self::LevelChange,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        match self {
            Self::ButtonPress => EVENT_BUTTON_PRESS,
            Self::ButtonHold => EVENT_BUTTON_HOLD,
            Self::AbsoluteInput => EVENT_ABSOLUTE_INPUT,
            Self::SceneChange => EVENT_SCENE_CHANGE,
            Self::Occupancy => EVENT_OCCUPANCY,
            Self::SystemVariableChange => EVENT_SYSTEM_VARIABLE,
            Self::ColourChange => EVENT_COLOUR_CHANGE,
            Self::ProfileChange => EVENT_PROFILE_CHANGE,
            Self::GroupOccupied => EVENT_GROUP_OCCUPIED,
            Self::LevelChange => EVENT_LEVEL_CHANGE,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::ButtonPress => "button press",
            Self::ButtonHold => "button hold",
            Self::AbsoluteInput => "absolute input",
            Self::SceneChange => "scene change",
            Self::Occupancy => "occupancy",
            Self::SystemVariableChange => "system variable change",
            Self::ColourChange => "colour change",
            Self::ProfileChange => "profile change",
            Self::GroupOccupied => "group occupied",
            Self::LevelChange => "level change",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Typed event payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    ButtonPress { device: u8, instance: u8 },
    ButtonHold { device: u8, instance: u8 },
    AbsoluteInput { device: u8, instance: u8, value: u16 },
    SceneChange { target: Address, scene: u8 },
    Occupancy { device: u8, instance: u8 },
    /// Value is `raw * 10^magnitude`.
    SystemVariableChange { variable: u8, raw: i32, magnitude: i8 },
    /// `colour` is `None` when the payload carries no recognisable colour.
    ColourChange { target: Address, colour: Option<Colour> },
    ProfileChange { profile: u16 },
    GroupOccupied { payload: Vec<u8> },
    LevelChange { target: Address, level: u8 },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::ButtonPress { .. } => EventType::ButtonPress,
            Self::ButtonHold { .. } => EventType::ButtonHold,
            Self::AbsoluteInput { .. } => EventType::AbsoluteInput,
            Self::SceneChange { .. } => EventType::SceneChange,
            Self::Occupancy { .. } => EventType::Occupancy,
            Self::SystemVariableChange { .. } => EventType::SystemVariableChange,
            Self::ColourChange { .. } => EventType::ColourChange,
            Self::ProfileChange { .. } => EventType::ProfileChange,
            Self::GroupOccupied { .. } => EventType::GroupOccupied,
            Self::LevelChange { .. } => EventType::LevelChange,
        }
    }
}

/// A decoded event and the controller it came from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub controller: ControllerIdentity,
    /// Raw 16-bit target from the frame.
    pub target: u16,
    pub kind: EventKind,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Decode an event frame received from `from`.
    pub fn decode(frame: &EventFrame, from: SocketAddr) -> Result<Self> {
        let ty = EventType::from_code(frame.code).ok_or(WireError::UnknownEvent {
            code: frame.code,
            target: frame.target,
        })?;
        let target = frame.target;
        let p = frame.payload.as_slice();
        let invalid = || WireError::InvalidTarget { event: ty.name(), target };

        let kind = match ty {
            EventType::ButtonPress | EventType::ButtonHold | EventType::Occupancy => {
                let device = device_number(target).ok_or_else(invalid)?;
                let instance = codec::read_uint8(p, 0).map_err(|e| e.with_raw(p))?;
                match ty {
                    EventType::ButtonPress => EventKind::ButtonPress { device, instance },
                    EventType::ButtonHold => EventKind::ButtonHold { device, instance },
                    _ => EventKind::Occupancy { device, instance },
                }
            }
            EventType::AbsoluteInput => {
                let device = device_number(target).ok_or_else(invalid)?;
                EventKind::AbsoluteInput {
                    device,
                    instance: codec::read_uint8(p, 0).map_err(|e| e.with_raw(p))?,
                    value: codec::read_uint16(p, 1).map_err(|e| e.with_raw(p))?,
                }
            }
            EventType::SceneChange => EventKind::SceneChange {
                target: Address::gear_or_group_from_target(target).ok_or_else(invalid)?,
                scene: codec::read_uint8(p, 0).map_err(|e| e.with_raw(p))?,
            },
            EventType::SystemVariableChange => {
                if target > u16::from(MAX_SYSTEM_VARIABLE) {
                    return Err(invalid());
                }
                EventKind::SystemVariableChange {
                    variable: target as u8,
                    raw: codec::read_int32(p, 0).map_err(|e| e.with_raw(p))?,
                    magnitude: codec::read_int8(p, 4).map_err(|e| e.with_raw(p))?,
                }
            }
            EventType::ColourChange => {
                let addr = match Address::gear_or_group_from_target(target) {
                    Some(a) => a,
                    None if COLOUR_GROUP_QUIRK.contains(&target) => {
                        warn!("colour change with target {target}, assuming group {}", target - 128);
                        Address::Group((target - 128) as u8)
                    }
                    None => return Err(invalid()),
                };
                EventKind::ColourChange { target: addr, colour: Colour::decode(p).ok() }
            }
            EventType::ProfileChange => EventKind::ProfileChange {
                profile: codec::read_uint16(p, 0).map_err(|e| e.with_raw(p))?,
            },
            EventType::GroupOccupied => EventKind::GroupOccupied { payload: p.to_vec() },
            EventType::LevelChange => EventKind::LevelChange {
                target: Address::gear_or_group_from_target(target).ok_or_else(invalid)?,
                level: codec::read_uint8(p, 1).map_err(|e| e.with_raw(p))?,
            },
        };

        Ok(Self {
            controller: ControllerIdentity::new(from).with_mac(frame.mac),
            target,
            kind,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.controller)?;
        match &self.kind {
            EventKind::ButtonPress { device, instance } => {
                write!(f, "button press device {device} instance {instance}")
            }
            EventKind::ButtonHold { device, instance } => {
                write!(f, "button hold device {device} instance {instance}")
            }
            EventKind::AbsoluteInput { device, instance, value } => {
                write!(f, "absolute input device {device} instance {instance} = {value}")
            }
            EventKind::SceneChange { target, scene } => write!(f, "{target} scene {scene}"),
            EventKind::Occupancy { device, instance } => {
                write!(f, "occupied device {device} instance {instance}")
            }
            EventKind::SystemVariableChange { variable, raw, magnitude } => {
                write!(f, "sysvar {variable} = {raw}e{magnitude}")
            }
            EventKind::ColourChange { target, colour: Some(c) } => write!(f, "{target} colour {c:?}"),
            EventKind::ColourChange { target, colour: None } => write!(f, "{target} colour unknown"),
            EventKind::ProfileChange { profile } => write!(f, "profile {profile}"),
            EventKind::GroupOccupied { .. } => write!(f, "group occupied target {}", self.target),
            EventKind::LevelChange { target, level } => write!(f, "{target} level {level}"),
        }
    }
}

impl EventKind {
    /// System variable value with its magnitude applied.
    pub fn system_variable_value(&self) -> Option<f64> {
        match *self {
            Self::SystemVariableChange { raw, magnitude, .. } => {
                Some(f64::from(raw) * 10f64.powi(i32::from(magnitude)))
            }
            _ => None,
        }
    }
}

fn device_number(target: u16) -> Option<u8> {
    match Address::device_from_target(target) {
        Some(Address::Device(n)) => Some(n),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
