//! TPI event emission settings: mode flags, event masks, filters, and the
//! unicast event target.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::codec;
use crate::error::{Result, WireError};

// ---------------------------------------------------------------------------
// EventMode
// ---------------------------------------------------------------------------

const MODE_ENABLED: u8 = 0x01;
const MODE_FILTERING: u8 = 0x02;
const MODE_UNICAST: u8 = 0x40;
/// Set when multicast is *disabled*.
const MODE_NO_MULTICAST: u8 = 0x80;

/// Event emission mode, carried in the address byte of an emit command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventMode {
    pub enabled: bool,
    pub filtering: bool,
    pub unicast: bool,
    pub multicast: bool,
}

impl Default for EventMode {
    /// Enabled, multicast only, no filtering.
    fn default() -> Self {
        Self { enabled: true, filtering: false, unicast: false, multicast: true }
    }
}

impl EventMode {
    pub fn disabled() -> Self {
        Self { enabled: false, filtering: false, unicast: false, multicast: true }
    }

    pub fn to_byte(self) -> u8 {
        let mut b = 0;
        if self.enabled {
            b |= MODE_ENABLED;
        }
        if self.filtering {
            b |= MODE_FILTERING;
        }
        if self.unicast {
            b |= MODE_UNICAST;
        }
        if !self.multicast {
            b |= MODE_NO_MULTICAST;
        }
        b
    }

    pub fn from_byte(b: u8) -> Self {
        Self {
            enabled: b & MODE_ENABLED != 0,
            filtering: b & MODE_FILTERING != 0,
            unicast: b & MODE_UNICAST != 0,
            multicast: b & MODE_NO_MULTICAST == 0,
        }
    }
}

// ---------------------------------------------------------------------------
// EventMask
// ---------------------------------------------------------------------------

/// Bit set of event categories, used by controller-side event filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventMask(pub u16);

impl EventMask {
    pub const BUTTON_PRESS: Self = Self(1 << 0);
    pub const BUTTON_HOLD: Self = Self(1 << 1);
    pub const ABSOLUTE_INPUT: Self = Self(1 << 2);
    pub const LEVEL_CHANGE: Self = Self(1 << 3);
    pub const GROUP_LEVEL_CHANGE: Self = Self(1 << 4);
    pub const SCENE_CHANGE: Self = Self(1 << 5);
    pub const IS_OCCUPIED: Self = Self(1 << 6);
    pub const SYSTEM_VARIABLE_CHANGE: Self = Self(1 << 7);
    pub const COLOUR_CHANGE: Self = Self(1 << 8);
    pub const PROFILE_CHANGE: Self = Self(1 << 9);

    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0x03FF);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn upper(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn lower(self) -> u8 {
        self.0 as u8
    }

    pub fn from_upper_lower(upper: u8, lower: u8) -> Self {
        Self(u16::from_be_bytes([upper, lower]))
    }
}

impl std::ops::BitOr for EventMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Filter listings come back at most this many entries per answer.
pub const FILTER_PAGE: u8 = 15;
const FILTER_ENTRY_LEN: usize = 4;

/// One active controller-side event filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventFilterEntry {
    /// Wire address byte the filter applies to.
    pub address: u8,
    /// Instance number, 0xFF for the whole address.
    pub instance: u8,
    pub mask: EventMask,
}

/// One page of a filter listing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventFilterPage {
    /// Event modes currently active on the controller.
    pub mode: EventMode,
    pub entries: Vec<EventFilterEntry>,
}

impl EventFilterPage {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mode = EventMode::from_byte(codec::read_uint8(data, 0)?);
        let entries = data[1..]
            .chunks_exact(FILTER_ENTRY_LEN)
            .map(|c| EventFilterEntry {
                address: c[0],
                instance: c[1],
                mask: EventMask::from_upper_lower(c[2], c[3]),
            })
            .collect();
        Ok(Self { mode, entries })
    }

    /// A full page means more entries may follow at the next offset.
    pub fn is_full(&self) -> bool {
        self.entries.len() >= FILTER_PAGE as usize
    }
}

// ---------------------------------------------------------------------------
// Unicast target
// ---------------------------------------------------------------------------

/// Unicast event destination as stored by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnicastTarget {
    pub mode: EventMode,
    pub addr: SocketAddrV4,
}

impl UnicastTarget {
    /// `PORT_HI PORT_LO IP0 IP1 IP2 IP3`, as sent in the set command.
    pub fn encode_addr(addr: SocketAddrV4) -> Vec<u8> {
        let mut buf = Vec::with_capacity(6);
        codec::write_uint16(&mut buf, addr.port());
        buf.extend_from_slice(&addr.ip().octets());
        buf
    }

    /// `MODE PORT_HI PORT_LO IP0 IP1 IP2 IP3`, as returned by the query.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 7 {
            return Err(WireError::payload_too_short("UnicastTarget", 7, data.len()).with_raw(data));
        }
        let port = codec::read_uint16(data, 1)?;
        let ip = Ipv4Addr::new(data[3], data[4], data[5], data[6]);
        Ok(Self {
            mode: EventMode::from_byte(data[0]),
            addr: SocketAddrV4::new(ip, port),
        })
    }
}
