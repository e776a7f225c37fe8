//! Typed decoders for ANSWER data.
//!
//! Every query command answers with a short byte string whose layout depends
//! on the command. [`Answer`] turns those bytes into a typed value; the
//! session uses it to hand callers decoded results instead of raw bytes.

use std::fmt;

use crate::codec;
use crate::error::{Result, WireError};
use crate::protocol::colour::{COLOUR_RECORD_LEN, Colour};
use crate::protocol::tpi::{EventFilterPage, EventMode, UnicastTarget};

/// A value decodable from the data bytes of an ANSWER response.
pub trait Answer: Sized {
    fn decode_answer(data: &[u8]) -> Result<Self>;
}

fn expect_len(msg_type: &'static str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(WireError::unexpected_length(msg_type, expected, data.len()).with_raw(data));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

impl Answer for u8 {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("UINT8", data, 1)?;
        Ok(data[0])
    }
}

impl Answer for bool {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("BOOL", data, 1)?;
        Ok(data[0] != 0)
    }
}

impl Answer for u16 {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("UINT16", data, 2)?;
        codec::read_uint16(data, 0)
    }
}

/// System variable values.
impl Answer for i16 {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("INT16", data, 2)?;
        codec::read_int16(data, 0)
    }
}

/// Big-endian unsigned of up to 8 bytes (serial numbers, EAN).
impl Answer for u64 {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() > 8 {
            return Err(WireError::unexpected_length("UINT64", 8, data.len()).with_raw(data));
        }
        Ok(data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }
}

/// ASCII labels.
impl Answer for String {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        codec::read_label(data)
    }
}

/// Raw byte lists (scene numbers, group numbers, addresses with instances).
impl Answer for Vec<u8> {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(data.to_vec())
    }
}

impl Answer for Colour {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Colour::decode(data)
    }
}

impl Answer for EventMode {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(EventMode::from_byte(codec::read_uint8(data, 0)?))
    }
}

impl Answer for EventFilterPage {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        EventFilterPage::decode(data)
    }
}

impl Answer for UnicastTarget {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        UnicastTarget::decode(data)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Controller firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Answer for Version {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("Version", data, 3)?;
        Ok(Self { major: data[0], minor: data[1], patch: data[2] })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Profile number that hands control back to the schedule.
pub const PROFILE_SCHEDULED: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProfilePriority {
    Scheduled,
    Medium,
    High,
    Emergency,
}

impl ProfilePriority {
    fn from_bits(b: u8) -> Self {
        match b & 0x03 {
            0 => Self::Scheduled,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Emergency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileEntry {
    pub number: u16,
    pub enabled: bool,
    pub priority: ProfilePriority,
}

/// Profile state and the list of configured profiles.
///
/// ```text
/// 0-1   current profile
/// 2-3   last scheduled profile
/// 4-7   last overridden, UTC seconds
/// 8-11  last scheduled, UTC seconds
/// 12..  [NUM_HI NUM_LO BEHAVIOUR] per profile
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileInfo {
    pub current: u16,
    pub last_scheduled: u16,
    pub last_overridden_utc: u32,
    pub last_scheduled_utc: u32,
    pub profiles: Vec<ProfileEntry>,
}

impl Answer for ProfileInfo {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(WireError::payload_too_short("ProfileInfo", 12, data.len()).with_raw(data));
        }
        let profiles = data[12..]
            .chunks_exact(3)
            .map(|c| ProfileEntry {
                number: u16::from_be_bytes([c[0], c[1]]),
                // Bit 0 set means the profile is disabled.
                enabled: c[2] & 0x01 == 0,
                priority: ProfilePriority::from_bits(c[2] >> 1),
            })
            .collect();
        Ok(Self {
            current: codec::read_uint16(data, 0)?,
            last_scheduled: codec::read_uint16(data, 2)?,
            last_overridden_utc: codec::read_uint32(data, 4)?,
            last_scheduled_utc: codec::read_uint32(data, 8)?,
            profiles,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileNumbers(pub Vec<u16>);

impl Answer for ProfileNumbers {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(Self(
            data.chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Bitmaps
// ---------------------------------------------------------------------------

/// Byte-ordered bitmap: bit `i` of byte `j` is member `8 * j + i`.
/// Used for control gear presence (8 bytes) and gear device types (4 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressBitmap(pub Vec<u8>);

impl Answer for AddressBitmap {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        let mut members = Vec::new();
        for (j, byte) in data.iter().enumerate() {
            for i in 0..8 {
                if byte & (1 << i) != 0 {
                    members.push((j * 8 + i) as u8);
                }
            }
        }
        Ok(Self(members))
    }
}

/// Big-endian 16-bit bitmap: bit `i` is member `i`. Used for group
/// membership and group scene numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bitmap16(pub Vec<u8>);

impl Answer for Bitmap16 {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("Bitmap16", data, 2)?;
        let word = u16::from_be_bytes([data[0], data[1]]);
        Ok(Self((0..16).filter(|i| word & (1 << i) != 0).collect()))
    }
}

// ---------------------------------------------------------------------------
// Gear
// ---------------------------------------------------------------------------

/// DALI control gear status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GearStatus(pub u8);

impl GearStatus {
    pub fn gear_failure(self) -> bool {
        self.0 & 0x01 != 0
    }
    pub fn lamp_failure(self) -> bool {
        self.0 & 0x02 != 0
    }
    pub fn lamp_power_on(self) -> bool {
        self.0 & 0x04 != 0
    }
    /// An arc level above max or below min was requested.
    pub fn limit_error(self) -> bool {
        self.0 & 0x08 != 0
    }
    pub fn fade_running(self) -> bool {
        self.0 & 0x10 != 0
    }
    pub fn reset(self) -> bool {
        self.0 & 0x20 != 0
    }
    pub fn missing_short_address(self) -> bool {
        self.0 & 0x40 != 0
    }
    pub fn power_failure(self) -> bool {
        self.0 & 0x80 != 0
    }
}

impl Answer for GearStatus {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(Self(codec::read_uint8(data, 0)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColourFeatures {
    pub xy: bool,
    pub tunable: bool,
    pub primaries: u8,
    pub rgbwaf_channels: u8,
}

impl Answer for ColourFeatures {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        let b = codec::read_uint8(data, 0)?;
        Ok(Self {
            xy: b & 0x01 != 0,
            tunable: b & 0x02 != 0,
            primaries: (b & 0x1C) >> 2,
            rgbwaf_channels: (b & 0xE0) >> 5,
        })
    }
}

/// Colour temperature limits in Kelvin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColourTempLimits {
    pub physical_warmest: u16,
    pub physical_coolest: u16,
    pub soft_warmest: u16,
    pub soft_coolest: u16,
    pub step: u16,
}

impl Answer for ColourTempLimits {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("ColourTempLimits", data, 10)?;
        Ok(Self {
            physical_warmest: codec::read_uint16(data, 0)?,
            physical_coolest: codec::read_uint16(data, 2)?,
            soft_warmest: codec::read_uint16(data, 4)?,
            soft_coolest: codec::read_uint16(data, 6)?,
            step: codec::read_uint16(data, 8)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

/// Scene levels for scenes 0..=11. `None` where the scene has no level.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneLevels(pub Vec<Option<u8>>);

impl Answer for SceneLevels {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(Self(data.iter().map(|&b| (b != 0xFF).then_some(b)).collect()))
    }
}

/// Colour records for a block of scenes, 7 bytes each. Records that do
/// not hold a recognised colour decode as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneColours(pub Vec<Option<Colour>>);

impl Answer for SceneColours {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(Self(
            data.chunks_exact(COLOUR_RECORD_LEN)
                .map(|c| Colour::decode(c).ok())
                .collect(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstanceType {
    PushButton,
    AbsoluteInput,
    OccupancySensor,
    LightSensor,
    GeneralSensor,
    Other(u8),
}

impl InstanceType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => Self::PushButton,
            0x02 => Self::AbsoluteInput,
            0x03 => Self::OccupancySensor,
            0x04 => Self::LightSensor,
            0x06 => Self::GeneralSensor,
            other => Self::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceInfo {
    pub number: u8,
    pub kind: InstanceType,
    pub active: bool,
    pub error: bool,
}

/// Instances on one control device, 4 bytes per instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instances(pub Vec<InstanceInfo>);

impl Answer for Instances {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        Ok(Self(
            data.chunks_exact(4)
                .map(|c| InstanceInfo {
                    number: c[0],
                    kind: InstanceType::from_byte(c[1]),
                    active: c[2] & 0x02 != 0,
                    error: c[2] & 0x01 != 0,
                })
                .collect(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccupancyTimers {
    pub deadtime: u8,
    pub hold: u8,
    pub report: u8,
    /// Seconds since the last detection.
    pub last_detect: u16,
}

impl Answer for OccupancyTimers {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("OccupancyTimers", data, 5)?;
        Ok(Self {
            deadtime: data[0],
            hold: data[1],
            report: data[2],
            last_detect: codec::read_uint16(data, 3)?,
        })
    }
}

/// Group targets of an instance. 0xFF on the wire means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceGroups {
    pub primary: Option<u8>,
    pub first: Option<u8>,
    pub second: Option<u8>,
}

impl Answer for InstanceGroups {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("InstanceGroups", data, 3)?;
        let group = |b: u8| (b != 0xFF).then_some(b);
        Ok(Self { primary: group(data[0]), first: group(data[1]), second: group(data[2]) })
    }
}

/// Last known LED state of a push button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ButtonLed(pub bool);

impl Answer for ButtonLed {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        match data {
            [0x01] => Ok(Self(false)),
            [0x02] => Ok(Self(true)),
            _ => Err(WireError::unexpected_length("ButtonLed", 1, data.len()).with_raw(data)),
        }
    }
}

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Raw answer byte for a group whose members sit at different levels.
pub const LEVEL_MIXED: u8 = 0xFF;

/// Arc level answered by a level query. `None` means the group's members
/// are at mixed levels, not full brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArcLevel(pub Option<u8>);

impl ArcLevel {
    pub fn is_mixed(self) -> bool {
        self.0.is_none()
    }
}

impl Answer for ArcLevel {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("ArcLevel", data, 1)?;
        Ok(Self((data[0] != LEVEL_MIXED).then_some(data[0])))
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupInfo {
    pub group: u8,
    pub occupied: bool,
    pub level: u8,
}

impl Answer for GroupInfo {
    fn decode_answer(data: &[u8]) -> Result<Self> {
        expect_len("GroupInfo", data, 3)?;
        Ok(Self { group: data[0], occupied: data[1] != 0, level: data[2] })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_level_mixed() {
        assert_eq!(ArcLevel::decode_answer(&[0xFE]).unwrap(), ArcLevel(Some(254)));
        assert_eq!(ArcLevel::decode_answer(&[0x00]).unwrap(), ArcLevel(Some(0)));
        let mixed = ArcLevel::decode_answer(&[0xFF]).unwrap();
        assert!(mixed.is_mixed());
        assert!(ArcLevel::decode_answer(&[0x10, 0x20]).is_err());
    }

    #[test]
    fn version() {
        let v = Version::decode_answer(&[2, 1, 14]).unwrap();
        assert_eq!(v.to_string(), "2.1.14");
        assert!(Version::decode_answer(&[2, 1]).is_err());
    }

    #[test]
    fn profile_info() {
        let mut data = vec![0x00, 0x02, 0x00, 0x01];
        data.extend_from_slice(&0x2233_4455u32.to_be_bytes());
        data.extend_from_slice(&0x4455_6677u32.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x01, 0b000]);
        data.extend_from_slice(&[0x00, 0x02, 0b101]);
        let info = ProfileInfo::decode_answer(&data).unwrap();
        assert_eq!(info.current, 2);
        assert_eq!(info.last_scheduled, 1);
        assert_eq!(info.last_overridden_utc, 0x2233_4455);
        assert_eq!(info.profiles.len(), 2);
        assert!(info.profiles[0].enabled);
        assert_eq!(info.profiles[0].priority, ProfilePriority::Scheduled);
        assert!(!info.profiles[1].enabled);
        assert_eq!(info.profiles[1].priority, ProfilePriority::High);
        assert!(ProfileInfo::decode_answer(&data[..11]).is_err());
    }

    #[test]
    fn bitmaps() {
        let gear = AddressBitmap::decode_answer(&[0b0000_0101, 0, 0, 0, 0, 0, 0, 0x80]).unwrap();
        assert_eq!(gear.0, vec![0, 2, 63]);
        // High byte carries groups 8..=15.
        let groups = Bitmap16::decode_answer(&[0x01, 0x02]).unwrap();
        assert_eq!(groups.0, vec![1, 8]);
    }

    #[test]
    fn gear_status_bits() {
        let s = GearStatus::decode_answer(&[0x14]).unwrap();
        assert!(s.lamp_power_on());
        assert!(s.fade_running());
        assert!(!s.lamp_failure());
    }

    #[test]
    fn colour_features_and_limits() {
        let f = ColourFeatures::decode_answer(&[0b1100_1010]).unwrap();
        assert!(!f.xy);
        assert!(f.tunable);
        assert_eq!(f.primaries, 2);
        assert_eq!(f.rgbwaf_channels, 6);

        let l = ColourTempLimits::decode_answer(&[
            0x0A, 0x8C, 0x17, 0x70, 0x0B, 0xB8, 0x13, 0x88, 0x00, 0x32,
        ])
        .unwrap();
        assert_eq!(l.physical_warmest, 2700);
        assert_eq!(l.physical_coolest, 6000);
        assert_eq!(l.step, 50);
    }

    #[test]
    fn scene_tables() {
        let levels = SceneLevels::decode_answer(&[0xFE, 0xFF, 0x00]).unwrap();
        assert_eq!(levels.0, vec![Some(0xFE), None, Some(0)]);

        let mut data = vec![0x20, 0x0A, 0x8C, 0, 0, 0, 0];
        data.extend_from_slice(&[0xFF; 7]);
        let colours = SceneColours::decode_answer(&data).unwrap();
        assert_eq!(colours.0, vec![Some(Colour::Tc { kelvin: 2700 }), None]);
    }

    #[test]
    fn instances() {
        let data = [0, 0x01, 0x02, 0, 1, 0x03, 0x01, 0, 2, 0x09, 0x00, 0];
        let list = Instances::decode_answer(&data).unwrap().0;
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].kind, InstanceType::PushButton);
        assert!(list[0].active);
        assert!(list[1].error);
        assert_eq!(list[2].kind, InstanceType::Other(9));
    }

    #[test]
    fn instance_details() {
        let t = OccupancyTimers::decode_answer(&[10, 60, 5, 0x01, 0x00]).unwrap();
        assert_eq!(t.last_detect, 256);
        let g = InstanceGroups::decode_answer(&[3, 0xFF, 7]).unwrap();
        assert_eq!(g, InstanceGroups { primary: Some(3), first: None, second: Some(7) });
        assert_eq!(ButtonLed::decode_answer(&[0x02]).unwrap(), ButtonLed(true));
        assert!(ButtonLed::decode_answer(&[0x00]).is_err());
    }

    #[test]
    fn scalars() {
        assert_eq!(i16::decode_answer(&[0xFF, 0xFE]).unwrap(), -2);
        assert_eq!(u64::decode_answer(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).unwrap(), 0x0102_0304_0506);
        assert!(u64::decode_answer(&[]).is_err());
        assert_eq!(String::decode_answer(b"Lobby\0").unwrap(), "Lobby");
        assert!(bool::decode_answer(&[1]).unwrap());
        assert_eq!(
            ProfileNumbers::decode_answer(&[0x00, 0x01, 0x01, 0x00]).unwrap().0,
            vec![1, 256]
        );
        let g = GroupInfo::decode_answer(&[4, 1, 0x80]).unwrap();
        assert!(g.occupied);
    }
}
