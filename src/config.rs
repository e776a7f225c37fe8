//! Session and listener settings.
//!
//! Plain values supplied at construction. Nothing here reads files or the
//! environment; with the `serde` feature an application can load these from
//! whatever format it likes.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Controller command port.
pub const DEFAULT_PORT: u16 = 5108;
/// Multicast group controllers emit events to.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 90, 67);
pub const MULTICAST_PORT: u16 = 6969;

/// Per-attempt response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);
pub const MIN_TIMEOUT: Duration = Duration::from_millis(10);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(10);
/// Retransmissions after the first attempt.
pub const DEFAULT_RETRIES: u32 = 2;

/// Window within which an identical event frame from the same controller
/// counts as a duplicate. Event frames carry no sequence number, so two
/// genuine identical events inside the window (a fast double press, the
/// same scene recalled twice) also collapse into one.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(250);
/// Receive threads wake this often to check their stop flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for one controller session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Local address to bind the command socket to.
    pub bind: SocketAddr,
    pub timeout: Duration,
    pub retries: u32,
    pub poll_interval: Duration,
    /// First sequence number to allocate. Starting away from zero avoids
    /// matching late replies addressed to a previous process.
    pub initial_seq: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_seq: 0,
        }
    }
}

impl SessionConfig {
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Per-attempt timeout, clamped to `MIN_TIMEOUT..=MAX_TIMEOUT`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_initial_seq(mut self, seq: u8) -> Self {
        self.initial_seq = seq;
        self
    }
}

/// Settings for the event listener.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ListenerConfig {
    /// Join the multicast group. Disable to listen on unicast only.
    pub multicast: bool,
    pub multicast_group: Ipv4Addr,
    pub multicast_port: u16,
    /// Interface to join the group on. Unspecified lets the OS pick.
    pub interface: Ipv4Addr,
    /// Local address for unicast events, if enabled.
    pub unicast_bind: Option<SocketAddr>,
    /// Identical frames from one controller inside this window are
    /// delivered once. This also merges genuine repeats such as a double
    /// press; `Duration::ZERO` turns de-duplication off.
    pub dedup_window: Duration,
    pub poll_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            multicast: true,
            multicast_group: MULTICAST_GROUP,
            multicast_port: MULTICAST_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            unicast_bind: None,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ListenerConfig {
    pub fn with_multicast(mut self, enabled: bool) -> Self {
        self.multicast = enabled;
        self
    }

    pub fn with_multicast_group(mut self, group: Ipv4Addr, port: u16) -> Self {
        self.multicast_group = group;
        self.multicast_port = port;
        self
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_unicast(mut self, bind: SocketAddr) -> Self {
        self.unicast_bind = Some(bind);
        self
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SessionConfig::default();
        assert_eq!(s.timeout, DEFAULT_TIMEOUT);
        assert_eq!(s.retries, 2);
        let l = ListenerConfig::default();
        assert!(l.multicast);
        assert_eq!(l.multicast_group, Ipv4Addr::new(239, 255, 90, 67));
        assert_eq!(l.multicast_port, 6969);
        assert_eq!(l.unicast_bind, None);
    }

    #[test]
    fn timeout_is_clamped() {
        let s = SessionConfig::default().with_timeout(Duration::from_secs(60));
        assert_eq!(s.timeout, MAX_TIMEOUT);
        let s = SessionConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(s.timeout, MIN_TIMEOUT);
    }
}
