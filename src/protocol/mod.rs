//! Command construction and encoding.
//!
//! A [`Command`] is built through one constructor per controller operation.
//! Constructors check argument ranges and that the target address is one
//! the operation accepts, so a built command always encodes. The session
//! supplies the sequence number at send time.
//!
//! Three body shapes exist on the wire:
//!
//! - **basic**: `ADDR D0 D1 D2`, exactly four bytes
//! - **colour**: `ADDR LEVEL TYPE CHANNELS...`, zero padded to at least eight
//! - **dynamic**: `LEN DATA...`

pub mod colour;
pub mod event;
pub mod query;
pub mod response;
pub mod tpi;

use std::fmt;
use std::net::SocketAddrV4;

use crate::addr::{Address, Instance, MAX_SCENE};
use crate::error::{Result, WireError};
use crate::frame::RequestFrame;

use colour::Colour;
use query::PROFILE_SCHEDULED;
use tpi::{EventMask, EventMode, UnicastTarget};

// ---------------------------------------------------------------------------
// Command codes
// ---------------------------------------------------------------------------

// Controller
pub const CMD_QUERY_CONTROLLER_VERSION: u8 = 0x1C;
pub const CMD_QUERY_CONTROLLER_LABEL: u8 = 0x24;
pub const CMD_QUERY_CONTROLLER_FITTING_NUMBER: u8 = 0x25;
pub const CMD_QUERY_CONTROLLER_STARTUP_COMPLETE: u8 = 0x27;
pub const CMD_QUERY_DALI_READY: u8 = 0x26;

// System variables
pub const CMD_SET_SYSTEM_VARIABLE: u8 = 0x36;
pub const CMD_QUERY_SYSTEM_VARIABLE: u8 = 0x37;
pub const CMD_QUERY_SYSTEM_VARIABLE_NAME: u8 = 0x42;

// TPI event settings
pub const CMD_ENABLE_EVENT_EMIT: u8 = 0x08;
pub const CMD_QUERY_EVENT_EMIT_STATE: u8 = 0x07;
pub const CMD_ADD_EVENT_FILTER: u8 = 0x31;
pub const CMD_QUERY_EVENT_FILTERS: u8 = 0x32;
pub const CMD_CLEAR_EVENT_FILTER: u8 = 0x33;
pub const CMD_SET_UNICAST_TARGET: u8 = 0x40;
pub const CMD_QUERY_UNICAST_TARGET: u8 = 0x41;

// Any address
pub const CMD_QUERY_OPERATING_MODE: u8 = 0x28;
pub const CMD_QUERY_DEVICE_LABEL: u8 = 0x03;
pub const CMD_QUERY_SERIAL: u8 = 0xB9;
pub const CMD_QUERY_FITTING_NUMBER: u8 = 0x22;
pub const CMD_QUERY_EAN: u8 = 0xB8;

// Groups
pub const CMD_QUERY_GROUP_MEMBERSHIP: u8 = 0x15;
pub const CMD_QUERY_GROUP_NUMBERS: u8 = 0x09;
pub const CMD_QUERY_GROUP_LABEL: u8 = 0x01;
pub const CMD_QUERY_SCENE_NUMBERS_FOR_GROUP: u8 = 0x1A;
pub const CMD_QUERY_SCENE_LABEL_FOR_GROUP: u8 = 0x1B;
pub const CMD_QUERY_GROUP_BY_NUMBER: u8 = 0x12;

// Profiles
pub const CMD_QUERY_PROFILE_INFORMATION: u8 = 0x43;
pub const CMD_QUERY_PROFILE_NUMBERS: u8 = 0x0B;
pub const CMD_QUERY_PROFILE_LABEL: u8 = 0x04;
pub const CMD_QUERY_CURRENT_PROFILE: u8 = 0x05;
pub const CMD_CHANGE_PROFILE: u8 = 0xC0;

// Instances
pub const CMD_QUERY_ADDRESSES_WITH_INSTANCES: u8 = 0x16;
pub const CMD_QUERY_INSTANCES: u8 = 0x0D;
pub const CMD_QUERY_INSTANCE_FITTING_NUMBER: u8 = 0x23;
pub const CMD_QUERY_INSTANCE_LABEL: u8 = 0xB7;
pub const CMD_QUERY_INSTANCE_GROUPS: u8 = 0x21;
pub const CMD_QUERY_OCCUPANCY_TIMERS: u8 = 0x0C;
pub const CMD_OVERRIDE_BUTTON_LED: u8 = 0x29;
pub const CMD_QUERY_BUTTON_LED: u8 = 0x30;

// Control gear
pub const CMD_QUERY_CONTROL_GEAR_ADDRESSES: u8 = 0x1D;
pub const CMD_QUERY_LEVEL: u8 = 0xAA;
pub const CMD_QUERY_GEAR_TYPE: u8 = 0xAC;
pub const CMD_QUERY_COLOUR_FEATURES: u8 = 0x35;
pub const CMD_QUERY_COLOUR_TEMP_LIMITS: u8 = 0x38;
pub const CMD_QUERY_GEAR_STATUS: u8 = 0xAB;
pub const CMD_QUERY_COLOUR: u8 = 0x34;
pub const CMD_SET_COLOUR: u8 = 0x0E;
pub const CMD_INHIBIT: u8 = 0xA0;
pub const CMD_ARC_LEVEL: u8 = 0xA2;
pub const CMD_ON_STEP_UP: u8 = 0xA3;
pub const CMD_STEP_DOWN_OFF: u8 = 0xA4;
pub const CMD_UP: u8 = 0xA5;
pub const CMD_DOWN: u8 = 0xA6;
pub const CMD_RECALL_MAX: u8 = 0xA7;
pub const CMD_RECALL_MIN: u8 = 0xA8;
pub const CMD_OFF: u8 = 0xA9;
pub const CMD_QUERY_MIN_LEVEL: u8 = 0xAF;
pub const CMD_QUERY_MAX_LEVEL: u8 = 0xB0;
pub const CMD_QUERY_FADE_RUNNING: u8 = 0xB1;
pub const CMD_ENABLE_DAPC_SEQUENCE: u8 = 0xB2;
pub const CMD_CUSTOM_FADE: u8 = 0xB4;
pub const CMD_GO_TO_LAST_ACTIVE_LEVEL: u8 = 0xB5;
pub const CMD_STOP_FADE: u8 = 0xC1;

// Scenes
pub const CMD_QUERY_SCENE_NUMBERS: u8 = 0x14;
pub const CMD_QUERY_SCENE_LEVELS: u8 = 0x1E;
pub const CMD_RECALL_SCENE: u8 = 0xA1;
pub const CMD_QUERY_LAST_SCENE: u8 = 0xAD;
pub const CMD_QUERY_LAST_SCENE_IS_CURRENT: u8 = 0xAE;
pub const CMD_QUERY_COLOUR_SCENE_MEMBERSHIP: u8 = 0x44;
pub const CMD_QUERY_COLOUR_SCENES_0_7: u8 = 0x45;
pub const CMD_QUERY_COLOUR_SCENES_8_11: u8 = 0x46;

/// Highest arc level a command may request. 0xFF means "mask" (no change).
pub const MAX_LEVEL: u8 = 254;
const LEVEL_UNCHANGED: u8 = 0xFF;

/// Minimum colour body length, including address byte.
const COLOUR_BODY_MIN: usize = 8;
/// Highest start address for the instance-address listing.
const MAX_INSTANCE_LISTING_START: u8 = 127;

// ---------------------------------------------------------------------------
// Target classes
// ---------------------------------------------------------------------------

const GEAR: u8 = 0x01;
const DEVICE: u8 = 0x02;
const GROUP: u8 = 0x04;
const BROADCAST: u8 = 0x08;

const GEAR_OR_GROUP: u8 = GEAR | GROUP;
const GEAR_GROUP_BROADCAST: u8 = GEAR | GROUP | BROADCAST;
const GEAR_OR_DEVICE: u8 = GEAR | DEVICE;
const GEAR_DEVICE_BROADCAST: u8 = GEAR | DEVICE | BROADCAST;

fn check_target(name: &'static str, target: Address, accepts: u8) -> Result<Address> {
    let class = match target {
        Address::Gear(_) => GEAR,
        Address::Device(_) => DEVICE,
        Address::Group(_) => GROUP,
        Address::Broadcast => BROADCAST,
        _ => 0,
    };
    if class & accepts == 0 {
        return Err(WireError::UnsupportedAddress { command: name, address: target });
    }
    target.validate()
}

fn check_level(level: u8) -> Result<()> {
    WireError::check_range("level", level.into(), 0, MAX_LEVEL.into())
}

fn check_scene(scene: u8) -> Result<()> {
    WireError::check_range("scene", scene.into(), 0, MAX_SCENE.into())
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Basic { address: u8, data: [u8; 3] },
    Colour { address: u8, level: u8, colour: Colour },
    Dynamic(Vec<u8>),
}

/// A validated controller command.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    name: &'static str,
    code: u8,
    target: Address,
    payload: Payload,
}

macro_rules! controller_command {
    ($fn_name:ident, $code:expr, $name:literal) => {
        pub fn $fn_name() -> Self {
            Self::basic($name, $code, Address::Controller, 0x00, [0; 3])
        }
    };
}

macro_rules! address_command {
    ($fn_name:ident, $code:expr, $name:literal, $accepts:expr) => {
        pub fn $fn_name(target: Address) -> Result<Self> {
            let target = check_target($name, target, $accepts)?;
            Ok(Self::basic($name, $code, target, target.wire_byte(), [0; 3]))
        }
    };
}

macro_rules! instance_command {
    ($fn_name:ident, $code:expr, $name:literal) => {
        pub fn $fn_name(instance: Instance) -> Result<Self> {
            let instance = instance.validate()?;
            let target = instance.address();
            Ok(Self::basic($name, $code, target, target.wire_byte(), [0x00, 0x00, instance.number]))
        }
    };
}

impl Command {
    fn basic(name: &'static str, code: u8, target: Address, address: u8, data: [u8; 3]) -> Self {
        Self { name, code, target, payload: Payload::Basic { address, data } }
    }

    // -- Controller --

    controller_command!(query_controller_version, CMD_QUERY_CONTROLLER_VERSION, "query controller version");
    controller_command!(query_controller_label, CMD_QUERY_CONTROLLER_LABEL, "query controller label");
    controller_command!(query_controller_fitting_number, CMD_QUERY_CONTROLLER_FITTING_NUMBER, "query controller fitting number");
    controller_command!(query_controller_startup_complete, CMD_QUERY_CONTROLLER_STARTUP_COMPLETE, "query controller startup complete");
    controller_command!(query_dali_ready, CMD_QUERY_DALI_READY, "query DALI ready");

    // -- System variables --

    /// Set a system variable (0..=147) to a signed 16-bit value.
    pub fn set_system_variable(variable: u8, value: i16) -> Result<Self> {
        let target = Address::system_variable(variable)?;
        let [hi, lo] = value.to_be_bytes();
        Ok(Self::basic("set system variable", CMD_SET_SYSTEM_VARIABLE, target, variable, [0x00, hi, lo]))
    }

    pub fn query_system_variable(variable: u8) -> Result<Self> {
        let target = Address::system_variable(variable)?;
        Ok(Self::basic("query system variable", CMD_QUERY_SYSTEM_VARIABLE, target, variable, [0; 3]))
    }

    pub fn query_system_variable_name(variable: u8) -> Result<Self> {
        let target = Address::system_variable(variable)?;
        Ok(Self::basic("query system variable name", CMD_QUERY_SYSTEM_VARIABLE_NAME, target, variable, [0; 3]))
    }

    // -- TPI event settings --

    /// Set the event emission mode. The mode flags travel in the address byte.
    pub fn enable_event_emit(mode: EventMode) -> Self {
        Self::basic("enable event emit", CMD_ENABLE_EVENT_EMIT, Address::Controller, mode.to_byte(), [0; 3])
    }

    controller_command!(query_event_emit_state, CMD_QUERY_EVENT_EMIT_STATE, "query event emit state");

    /// Mute the events in `mask` from a gear, device (or one of its
    /// instances), or every address.
    pub fn add_event_filter(target: Address, instance: Option<u8>, mask: EventMask) -> Result<Self> {
        Self::event_filter("add event filter", CMD_ADD_EVENT_FILTER, target, instance, mask)
    }

    /// Unmute the events in `mask`.
    pub fn clear_event_filter(target: Address, instance: Option<u8>, mask: EventMask) -> Result<Self> {
        Self::event_filter("clear event filter", CMD_CLEAR_EVENT_FILTER, target, instance, mask)
    }

    fn event_filter(
        name: &'static str,
        code: u8,
        target: Address,
        instance: Option<u8>,
        mask: EventMask,
    ) -> Result<Self> {
        let target = check_target(name, target, GEAR_DEVICE_BROADCAST)?;
        let instance = instance_byte(instance)?;
        Ok(Self::basic(name, code, target, target.wire_byte(), [instance, mask.upper(), mask.lower()]))
    }

    /// List active filters starting at entry `start_at`. Answers hold at most
    /// [`tpi::FILTER_PAGE`] entries.
    pub fn query_event_filters(target: Address, instance: Option<u8>, start_at: u8) -> Result<Self> {
        let name = "query event filters";
        let target = check_target(name, target, GEAR_DEVICE_BROADCAST)?;
        let instance = instance_byte(instance)?;
        Ok(Self::basic(name, CMD_QUERY_EVENT_FILTERS, target, target.wire_byte(), [start_at, 0x00, instance]))
    }

    /// Point unicast events at `addr`, or clear the target with `None`.
    pub fn set_unicast_target(addr: Option<SocketAddrV4>) -> Self {
        let data = match addr {
            Some(addr) => UnicastTarget::encode_addr(addr),
            None => vec![0; 6],
        };
        Self {
            name: "set unicast target",
            code: CMD_SET_UNICAST_TARGET,
            target: Address::Controller,
            payload: Payload::Dynamic(data),
        }
    }

    controller_command!(query_unicast_target, CMD_QUERY_UNICAST_TARGET, "query unicast target");

    // -- Any address --

    address_command!(query_operating_mode, CMD_QUERY_OPERATING_MODE, "query operating mode", GEAR_OR_DEVICE);
    address_command!(query_device_label, CMD_QUERY_DEVICE_LABEL, "query device label", GEAR_OR_DEVICE);
    address_command!(query_serial, CMD_QUERY_SERIAL, "query serial", GEAR_OR_DEVICE);
    address_command!(query_fitting_number, CMD_QUERY_FITTING_NUMBER, "query fitting number", GEAR_OR_DEVICE);
    address_command!(query_ean, CMD_QUERY_EAN, "query EAN", GEAR_OR_DEVICE);

    // -- Groups --

    address_command!(query_group_membership, CMD_QUERY_GROUP_MEMBERSHIP, "query group membership", GEAR);
    controller_command!(query_group_numbers, CMD_QUERY_GROUP_NUMBERS, "query group numbers");
    address_command!(query_group_label, CMD_QUERY_GROUP_LABEL, "query group label", GROUP);
    address_command!(query_scene_numbers_for_group, CMD_QUERY_SCENE_NUMBERS_FOR_GROUP, "query scene numbers for group", GROUP);
    address_command!(query_group_by_number, CMD_QUERY_GROUP_BY_NUMBER, "query group by number", GROUP);

    pub fn query_scene_label_for_group(group: Address, scene: u8) -> Result<Self> {
        let name = "query scene label for group";
        let target = check_target(name, group, GROUP)?;
        check_scene(scene)?;
        Ok(Self::basic(name, CMD_QUERY_SCENE_LABEL_FOR_GROUP, target, target.wire_byte(), [scene, 0x00, 0x00]))
    }

    // -- Profiles --

    controller_command!(query_profile_information, CMD_QUERY_PROFILE_INFORMATION, "query profile information");
    controller_command!(query_profile_numbers, CMD_QUERY_PROFILE_NUMBERS, "query profile numbers");
    controller_command!(query_current_profile, CMD_QUERY_CURRENT_PROFILE, "query current profile");

    pub fn query_profile_label(profile: u16) -> Self {
        let [hi, lo] = profile.to_be_bytes();
        Self::basic("query profile label", CMD_QUERY_PROFILE_LABEL, Address::Profile(profile), 0x00, [0x00, hi, lo])
    }

    pub fn change_profile(profile: u16) -> Self {
        let [hi, lo] = profile.to_be_bytes();
        Self::basic("change profile", CMD_CHANGE_PROFILE, Address::Profile(profile), 0x00, [0x00, hi, lo])
    }

    /// Hand profile selection back to the controller's schedule.
    pub fn return_to_scheduled_profile() -> Self {
        Self::change_profile(PROFILE_SCHEDULED)
    }

    // -- Instances --

    /// List device addresses (wire 64..=127) that have instances, starting
    /// at wire address `start_at`. Long listings need several calls.
    pub fn query_addresses_with_instances(start_at: u8) -> Result<Self> {
        WireError::check_range("start address", start_at.into(), 0, MAX_INSTANCE_LISTING_START.into())?;
        Ok(Self::basic(
            "query addresses with instances",
            CMD_QUERY_ADDRESSES_WITH_INSTANCES,
            Address::Controller,
            0x00,
            [0x00, 0x00, start_at],
        ))
    }

    address_command!(query_instances, CMD_QUERY_INSTANCES, "query instances", DEVICE);
    instance_command!(query_instance_fitting_number, CMD_QUERY_INSTANCE_FITTING_NUMBER, "query instance fitting number");
    instance_command!(query_instance_label, CMD_QUERY_INSTANCE_LABEL, "query instance label");
    instance_command!(query_instance_groups, CMD_QUERY_INSTANCE_GROUPS, "query instance groups");
    instance_command!(query_occupancy_timers, CMD_QUERY_OCCUPANCY_TIMERS, "query occupancy timers");
    instance_command!(query_button_led, CMD_QUERY_BUTTON_LED, "query button LED");

    pub fn override_button_led(instance: Instance, on: bool) -> Result<Self> {
        let instance = instance.validate()?;
        let target = instance.address();
        let state = if on { 0x02 } else { 0x01 };
        Ok(Self::basic(
            "override button LED",
            CMD_OVERRIDE_BUTTON_LED,
            target,
            target.wire_byte(),
            [0x00, state, instance.number],
        ))
    }

    // -- Control gear --

    controller_command!(query_control_gear_addresses, CMD_QUERY_CONTROL_GEAR_ADDRESSES, "query control gear addresses");
    // Answer decodes as `query::ArcLevel`: 255 means mixed group levels.
    address_command!(query_level, CMD_QUERY_LEVEL, "query level", GEAR_OR_GROUP);
    address_command!(query_gear_type, CMD_QUERY_GEAR_TYPE, "query gear type", GEAR);
    address_command!(query_colour_features, CMD_QUERY_COLOUR_FEATURES, "query colour features", GEAR);
    address_command!(query_colour_temp_limits, CMD_QUERY_COLOUR_TEMP_LIMITS, "query colour temp limits", GEAR);
    address_command!(query_gear_status, CMD_QUERY_GEAR_STATUS, "query gear status", GEAR_GROUP_BROADCAST);
    address_command!(query_colour, CMD_QUERY_COLOUR, "query colour", GEAR);
    address_command!(on_step_up, CMD_ON_STEP_UP, "on step up", GEAR_GROUP_BROADCAST);
    address_command!(step_down_off, CMD_STEP_DOWN_OFF, "step down off", GEAR_GROUP_BROADCAST);
    address_command!(up, CMD_UP, "up", GEAR_GROUP_BROADCAST);
    address_command!(down, CMD_DOWN, "down", GEAR_GROUP_BROADCAST);
    address_command!(recall_max, CMD_RECALL_MAX, "recall max", GEAR_GROUP_BROADCAST);
    address_command!(recall_min, CMD_RECALL_MIN, "recall min", GEAR_GROUP_BROADCAST);
    address_command!(off, CMD_OFF, "off", GEAR_GROUP_BROADCAST);
    address_command!(query_min_level, CMD_QUERY_MIN_LEVEL, "query min level", GEAR);
    address_command!(query_max_level, CMD_QUERY_MAX_LEVEL, "query max level", GEAR);
    address_command!(query_fade_running, CMD_QUERY_FADE_RUNNING, "query fade running", GEAR);
    address_command!(enable_dapc_sequence, CMD_ENABLE_DAPC_SEQUENCE, "enable DAPC sequence", GEAR);
    address_command!(go_to_last_active_level, CMD_GO_TO_LAST_ACTIVE_LEVEL, "go to last active level", GEAR_OR_GROUP);
    address_command!(stop_fade, CMD_STOP_FADE, "stop fade", GEAR_GROUP_BROADCAST);

    /// Set a colour, optionally with a level. `None` leaves the level unchanged.
    pub fn set_colour(target: Address, colour: Colour, level: Option<u8>) -> Result<Self> {
        let name = "set colour";
        let target = check_target(name, target, GEAR_GROUP_BROADCAST)?;
        colour.validate()?;
        let level = match level {
            Some(l) => {
                check_level(l)?;
                l
            }
            None => LEVEL_UNCHANGED,
        };
        Ok(Self {
            name,
            code: CMD_SET_COLOUR,
            target,
            payload: Payload::Colour { address: target.wire_byte(), level, colour },
        })
    }

    /// Stop sensors from affecting a target for `seconds`.
    pub fn inhibit(target: Address, seconds: u16) -> Result<Self> {
        let name = "inhibit";
        let target = check_target(name, target, GEAR_GROUP_BROADCAST)?;
        let [hi, lo] = seconds.to_be_bytes();
        Ok(Self::basic(name, CMD_INHIBIT, target, target.wire_byte(), [0x00, hi, lo]))
    }

    pub fn arc_level(target: Address, level: u8) -> Result<Self> {
        let name = "arc level";
        let target = check_target(name, target, GEAR_GROUP_BROADCAST)?;
        check_level(level)?;
        Ok(Self::basic(name, CMD_ARC_LEVEL, target, target.wire_byte(), [0x00, 0x00, level]))
    }

    /// Fade to `level` over `seconds`.
    pub fn custom_fade(target: Address, level: u8, seconds: u16) -> Result<Self> {
        let name = "custom fade";
        let target = check_target(name, target, GEAR_OR_GROUP)?;
        check_level(level)?;
        let [hi, lo] = seconds.to_be_bytes();
        Ok(Self::basic(name, CMD_CUSTOM_FADE, target, target.wire_byte(), [level, hi, lo]))
    }

    // -- Scenes --

    address_command!(query_scene_numbers, CMD_QUERY_SCENE_NUMBERS, "query scene numbers", GEAR);
    address_command!(query_scene_levels, CMD_QUERY_SCENE_LEVELS, "query scene levels", GEAR);
    address_command!(query_last_scene, CMD_QUERY_LAST_SCENE, "query last scene", GEAR_GROUP_BROADCAST);
    address_command!(query_last_scene_is_current, CMD_QUERY_LAST_SCENE_IS_CURRENT, "query last scene is current", GEAR_GROUP_BROADCAST);
    address_command!(query_colour_scene_membership, CMD_QUERY_COLOUR_SCENE_MEMBERSHIP, "query colour scene membership", GEAR);
    address_command!(query_colour_scenes_0_7, CMD_QUERY_COLOUR_SCENES_0_7, "query colour scenes 0-7", GEAR);
    address_command!(query_colour_scenes_8_11, CMD_QUERY_COLOUR_SCENES_8_11, "query colour scenes 8-11", GEAR);

    pub fn recall_scene(target: Address, scene: u8) -> Result<Self> {
        let name = "recall scene";
        let target = check_target(name, target, GEAR_GROUP_BROADCAST)?;
        check_scene(scene)?;
        Ok(Self::basic(name, CMD_RECALL_SCENE, target, target.wire_byte(), [0x00, 0x00, scene]))
    }

    // -- Accessors --

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn target(&self) -> Address {
        self.target
    }

    /// Shaped request body, without the frame header or checksum.
    pub fn body(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Basic { address, data } => vec![*address, data[0], data[1], data[2]],
            Payload::Colour { address, level, colour } => {
                let mut body = vec![*address, *level];
                body.extend(colour.encode());
                if body.len() < COLOUR_BODY_MIN {
                    body.resize(COLOUR_BODY_MIN, 0x00);
                }
                body
            }
            Payload::Dynamic(data) => {
                let mut body = Vec::with_capacity(data.len() + 1);
                body.push(data.len() as u8);
                body.extend_from_slice(data);
                body
            }
        }
    }

    /// Frame this command with sequence number `seq`.
    pub fn encode(&self, seq: u8) -> RequestFrame {
        RequestFrame { seq, command: self.code, body: self.body() }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command[0x{:02X} {} -> {}]", self.code, self.name, self.target)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.target)
    }
}

fn instance_byte(instance: Option<u8>) -> Result<u8> {
    match instance {
        Some(n) => {
            WireError::check_range("instance", n.into(), 0, crate::addr::MAX_INSTANCE.into())?;
            Ok(n)
        }
        None => Ok(0xFF),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
