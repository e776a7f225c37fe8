//! Address space and controller identity.
//!
//! A command frame carries a single address byte. Gear (ECG) use 0..=63,
//! control devices (ECD) and groups share the 64.. range and are told apart
//! by the command family, broadcast is 0xFF. Event frames carry the same
//! numbers in a 16-bit target field.

use std::fmt;
use std::net::SocketAddr;

use crate::error::{Result, WireError};

pub const MAX_GEAR: u8 = 63;
pub const MAX_DEVICE: u8 = 63;
pub const MAX_GROUP: u8 = 15;
pub const MAX_INSTANCE: u8 = 31;
pub const MAX_SCENE: u8 = 11;
/// System variables are numbered 0..=147.
pub const MAX_SYSTEM_VARIABLE: u8 = 147;

/// Offset applied to device and group numbers on the wire.
pub const UPPER_OFFSET: u8 = 64;
pub const BROADCAST: u8 = 0xFF;

/// Target of a command or source of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    /// Whole-controller commands (address byte 0x00).
    Controller,
    /// Control gear (ECG), 0..=63.
    Gear(u8),
    /// Control device (ECD), 0..=63. Wire 64..=127.
    Device(u8),
    /// DALI group, 0..=15. Wire 64..=79.
    Group(u8),
    Broadcast,
    /// System variable index, 0..=147.
    SystemVariable(u8),
    /// Controller profile. Travels in the 2-byte data field, not the
    /// address byte.
    Profile(u16),
}

impl Address {
    pub fn gear(n: u8) -> Result<Self> {
        WireError::check_range("gear", n.into(), 0, MAX_GEAR.into())?;
        Ok(Self::Gear(n))
    }

    pub fn device(n: u8) -> Result<Self> {
        WireError::check_range("device", n.into(), 0, MAX_DEVICE.into())?;
        Ok(Self::Device(n))
    }

    pub fn group(n: u8) -> Result<Self> {
        WireError::check_range("group", n.into(), 0, MAX_GROUP.into())?;
        Ok(Self::Group(n))
    }

    pub fn system_variable(n: u8) -> Result<Self> {
        WireError::check_range("system variable", n.into(), 0, MAX_SYSTEM_VARIABLE.into())?;
        Ok(Self::SystemVariable(n))
    }

    /// Re-check the numeric range of an address built directly from a variant.
    pub fn validate(self) -> Result<Self> {
        match self {
            Self::Gear(n) => Self::gear(n),
            Self::Device(n) => Self::device(n),
            Self::Group(n) => Self::group(n),
            Self::SystemVariable(n) => Self::system_variable(n),
            Self::Controller | Self::Broadcast | Self::Profile(_) => Ok(self),
        }
    }

    /// The single address byte used in command frames.
    pub fn wire_byte(self) -> u8 {
        match self {
            Self::Controller | Self::Profile(_) => 0x00,
            Self::Gear(n) | Self::SystemVariable(n) => n,
            Self::Device(n) | Self::Group(n) => n.wrapping_add(UPPER_OFFSET),
            Self::Broadcast => BROADCAST,
        }
    }

    /// The 16-bit target an event frame would carry for this address.
    pub fn event_target(self) -> u16 {
        match self {
            Self::Profile(p) => p,
            other => u16::from(other.wire_byte()),
        }
    }

    /// Decode an event target in the gear/group space (scene, level, colour).
    pub fn gear_or_group_from_target(target: u16) -> Option<Self> {
        match target {
            0..=63 => Some(Self::Gear(target as u8)),
            64..=79 => Some(Self::Group((target - 64) as u8)),
            _ => None,
        }
    }

    /// Decode an event target in the control-device space (buttons, sensors).
    pub fn device_from_target(target: u16) -> Option<Self> {
        match target {
            64..=127 => Some(Self::Device((target - 64) as u8)),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller => write!(f, "controller"),
            Self::Gear(n) => write!(f, "gear {n}"),
            Self::Device(n) => write!(f, "device {n}"),
            Self::Group(n) => write!(f, "group {n}"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::SystemVariable(n) => write!(f, "sysvar {n}"),
            Self::Profile(p) => write!(f, "profile {p}"),
        }
    }
}

/// An input instance (button, sensor) on a control device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instance {
    pub device: u8,
    pub number: u8,
}

impl Instance {
    pub fn new(device: u8, number: u8) -> Result<Self> {
        Self { device, number }.validate()
    }

    pub fn validate(self) -> Result<Self> {
        Address::device(self.device)?;
        WireError::check_range("instance", self.number.into(), 0, MAX_INSTANCE.into())?;
        Ok(self)
    }

    pub fn address(self) -> Address {
        Address::Device(self.device)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {} instance {}", self.device, self.number)
    }
}

/// Hardware address of a controller, as carried in event frames.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({self})")
    }
}

/// Network identity of one physical controller.
///
/// The command endpoint names the controller. The MAC is filled in when
/// known and is what event frames carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerIdentity {
    pub addr: SocketAddr,
    pub mac: Option<MacAddr>,
}

impl ControllerIdentity {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, mac: None }
    }

    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = Some(mac);
        self
    }
}

impl fmt::Display for ControllerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mac {
            Some(mac) => write!(f, "{} ({mac})", self.addr),
            None => write!(f, "{}", self.addr),
        }
    }
}
