//! Event listener: multicast and unicast reception, de-duplication, and
//! dispatch to subscribers.
//!
//! Every subscriber gets its own worker thread and queue, so a slow or
//! panicking handler never holds up reception or other subscribers. Events
//! reach one subscriber in the order they were accepted.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, SocketAddrV4, UdpSocket};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};
use socket2::{Domain, Protocol, Socket, Type};

use crate::addr::MacAddr;
use crate::codec;
use crate::config::ListenerConfig;
use crate::conn::{self, DatagramSink};
use crate::frame::Packet;
use crate::protocol::event::{Event, EventType};

const RECV_BUF: usize = 512;

/// Which events a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Only(EventType),
}

impl EventFilter {
    pub fn matches(self, ty: EventType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(want) => want == ty,
        }
    }
}

/// Handle returned by [`Listener::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What [`Listener::ingest`] did with a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Decoded and queued for this many subscribers.
    Dispatched(usize),
    /// Identical frame seen from the same controller within the window.
    Duplicate,
    /// Failed checksum, framing, or event decoding.
    Dropped,
    /// A valid frame that is not an event.
    Ignored,
}

/// Listener counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: u64,
    pub dispatched: u64,
    pub duplicates: u64,
    pub dropped: u64,
}

struct Subscriber {
    id: SubscriptionId,
    filter: EventFilter,
    tx: Sender<Arc<Event>>,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    dispatched: AtomicU64,
    duplicates: AtomicU64,
    dropped: AtomicU64,
}

struct Shared {
    dedup_window: Duration,
    seen: Mutex<HashMap<(MacAddr, Vec<u8>), Instant>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    counters: Counters,
}

/// Receives events from controllers and fans them out to subscribers.
///
/// A listener created with [`Listener::new`] has no sockets; datagrams reach
/// it through [`Listener::ingest`] or as a session's [`DatagramSink`].
/// [`Listener::start`] opens the multicast and unicast sockets.
pub struct Listener {
    config: ListenerConfig,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    receivers: Mutex<Vec<JoinHandle<()>>>,
    local_addrs: Mutex<Vec<SocketAddr>>,
}

impl Listener {
    pub fn new(config: ListenerConfig) -> Self {
        let shared = Shared {
            dedup_window: config.dedup_window,
            seen: Mutex::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            counters: Counters::default(),
        };
        Self {
            config,
            shared: Arc::new(shared),
            stop: Arc::new(AtomicBool::new(false)),
            receivers: Mutex::new(Vec::new()),
            local_addrs: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Open the configured sockets and start one receive thread per socket.
    ///
    /// Calling `start` on a running listener is a no-op.
    pub fn start(&self) -> io::Result<()> {
        let mut receivers = self.receivers.lock();
        if !receivers.is_empty() {
            return Ok(());
        }
        self.stop.store(false, Ordering::Release);

        let mut sockets = Vec::new();
        if self.config.multicast {
            sockets.push(("multicast", self.open_multicast()?));
        }
        if let Some(bind) = self.config.unicast_bind {
            let socket = UdpSocket::bind(bind)?;
            socket.set_read_timeout(Some(self.config.poll_interval))?;
            sockets.push(("unicast", socket));
        }

        let mut addrs = self.local_addrs.lock();
        for (label, socket) in sockets {
            let local = socket.local_addr()?;
            info!("listening for {label} events on {local}");
            addrs.push(local);
            let shared = self.shared.clone();
            let stop = self.stop.clone();
            let handle = thread::Builder::new()
                .name(format!("tpi-events-{label}"))
                .spawn(move || receive_loop(&socket, &shared, &stop))?;
            receivers.push(handle);
        }
        Ok(())
    }

    fn open_multicast(&self) -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        let bind = SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, self.config.multicast_port);
        socket.bind(&SocketAddr::V4(bind).into())?;
        socket.join_multicast_v4(&self.config.multicast_group, &self.config.interface)?;
        socket.set_read_timeout(Some(self.config.poll_interval))?;
        debug!(
            "joined {}:{} on {}",
            self.config.multicast_group, self.config.multicast_port, self.config.interface
        );
        Ok(socket.into())
    }

    /// Local addresses of the open sockets.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.local_addrs.lock().clone()
    }

    /// Register `handler` for events matching `filter`.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + 'static,
    {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = crossbeam_channel::unbounded::<Arc<Event>>();
        let worker = thread::spawn(move || {
            for event in rx {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(event.as_ref())));
                if outcome.is_err() {
                    warn!("subscriber {id:?} panicked handling {event}");
                }
            }
        });
        self.shared.subscribers.write().push(Subscriber { id, filter, tx, worker });
        debug!("subscribed {id:?} to {filter:?}");
        id
    }

    /// Remove a subscription. Events already queued for it are still
    /// delivered. Returns false if `id` is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.shared.subscribers.write();
        let Some(pos) = subs.iter().position(|s| s.id == id) else {
            return false;
        };
        // Dropping the sender ends the worker once its queue drains.
        subs.remove(pos);
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Process one datagram as if it had arrived on a listener socket.
    pub fn ingest(&self, datagram: &[u8], from: SocketAddr) -> Ingest {
        self.shared.ingest(datagram, from)
    }

    pub fn stats(&self) -> ListenerStats {
        let c = &self.shared.counters;
        ListenerStats {
            received: c.received.load(Ordering::Relaxed),
            dispatched: c.dispatched.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    /// Close the sockets, drain and stop every subscriber worker.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.receivers.lock().drain(..) {
            let _ = handle.join();
        }
        self.local_addrs.lock().clear();

        let subs: Vec<Subscriber> = self.shared.subscribers.write().drain(..).collect();
        let me = thread::current().id();
        for Subscriber { tx, worker, .. } in subs {
            drop(tx);
            // A handler calling stop() cannot join its own worker.
            if worker.thread().id() != me {
                let _ = worker.join();
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

impl DatagramSink for Listener {
    fn deliver(&self, datagram: &[u8], from: SocketAddr) {
        self.shared.ingest(datagram, from);
    }
}

impl Shared {
    fn ingest(&self, datagram: &[u8], from: SocketAddr) -> Ingest {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let frame = match Packet::parse(datagram) {
            Ok(Packet::Event(frame)) => frame,
            Ok(other) => {
                trace!("ignoring non-event frame from {from}: {other:?}");
                return Ingest::Ignored;
            }
            Err(e) => {
                debug!("dropping datagram from {from}: {e} | {}", codec::hex(datagram));
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return Ingest::Dropped;
            }
        };

        if self.is_duplicate(frame.mac, datagram) {
            trace!("duplicate event from {} via {from}", frame.mac);
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            return Ingest::Duplicate;
        }

        let event = match Event::decode(&frame, from) {
            Ok(ev) => Arc::new(ev),
            Err(e) => {
                debug!("dropping event from {from}: {e}");
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                return Ingest::Dropped;
            }
        };
        trace!("event: {event}");

        let ty = event.event_type();
        let mut queued = 0;
        for sub in self.subscribers.read().iter().filter(|s| s.filter.matches(ty)) {
            if sub.tx.send(event.clone()).is_ok() {
                queued += 1;
            }
        }
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        Ingest::Dispatched(queued)
    }

    /// Record the frame and report whether it was already seen within the
    /// window. Expired entries are pruned on every call.
    fn is_duplicate(&self, mac: MacAddr, datagram: &[u8]) -> bool {
        if self.dedup_window.is_zero() {
            return false;
        }
        let now = Instant::now();
        let window = self.dedup_window;
        let mut seen = self.seen.lock();
        seen.retain(|_, at| now.duration_since(*at) < window);
        let key = (mac, datagram.to_vec());
        if seen.contains_key(&key) {
            return true;
        }
        seen.insert(key, now);
        false
    }
}

fn receive_loop(socket: &UdpSocket, shared: &Shared, stop: &AtomicBool) {
    let mut buf = [0u8; RECV_BUF];
    while !stop.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((n, from)) => {
                shared.ingest(&buf[..n], from);
            }
            Err(e) => {
                if let Some(pause) = conn::recv_backoff(&e) {
                    debug!("event socket error: {e}");
                    thread::sleep(pause);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;

    use crate::addr::Address;
    use crate::frame::EventFrame;
    use crate::protocol::event::{EVENT_LEVEL_CHANGE, EVENT_SCENE_CHANGE, EventKind};

    const MAC: MacAddr = MacAddr([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);

    fn scene_event(scene: u8) -> Vec<u8> {
        EventFrame { mac: MAC, target: 68, code: EVENT_SCENE_CHANGE, payload: vec![scene] }.encode()
    }

    fn level_event(level: u8) -> Vec<u8> {
        EventFrame { mac: MAC, target: 3, code: EVENT_LEVEL_CHANGE, payload: vec![0x00, level] }
            .encode()
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn collect(listener: &Listener, filter: EventFilter) -> Receiver<Event> {
        let (tx, rx) = crossbeam_channel::unbounded();
        listener.subscribe(filter, move |ev| {
            let _ = tx.send(ev.clone());
        });
        rx
    }

    const WAIT: Duration = Duration::from_millis(500);

    #[test]
    fn duplicate_within_window_dispatched_once() {
        let listener = Listener::new(ListenerConfig::default());
        let rx = collect(&listener, EventFilter::All);

        let wire = scene_event(4);
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Dispatched(1));
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:40000")), Ingest::Duplicate);

        let ev = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(ev.kind, EventKind::SceneChange { target: Address::Group(4), scene: 4 });
        assert_eq!(ev.controller.mac, Some(MAC));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(listener.stats().duplicates, 1);
    }

    #[test]
    fn different_payload_is_not_duplicate() {
        let listener = Listener::new(ListenerConfig::default());
        let rx = collect(&listener, EventFilter::All);
        listener.ingest(&scene_event(1), addr("10.0.0.5:6969"));
        listener.ingest(&scene_event(2), addr("10.0.0.5:6969"));
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn repeat_after_window_is_dispatched() {
        let config = ListenerConfig::default().with_dedup_window(Duration::from_millis(20));
        let listener = Listener::new(config);
        let rx = collect(&listener, EventFilter::All);
        let wire = scene_event(4);
        listener.ingest(&wire, addr("10.0.0.5:6969"));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Dispatched(1));
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn identical_press_inside_window_is_merged() {
        let listener = Listener::new(ListenerConfig::default());
        let wire = scene_event(4);
        listener.ingest(&wire, addr("10.0.0.5:6969"));
        thread::sleep(Duration::from_millis(120));
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Duplicate);
    }

    #[test]
    fn zero_window_keeps_every_repeat() {
        let config = ListenerConfig::default().with_dedup_window(Duration::ZERO);
        let listener = Listener::new(config);
        let rx = collect(&listener, EventFilter::All);
        let wire = scene_event(4);
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Dispatched(1));
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Dispatched(1));
        assert!(rx.recv_timeout(WAIT).is_ok());
        assert!(rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn stop_drains_queue_and_drops_subscribers() {
        let listener = Listener::new(ListenerConfig::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        listener.subscribe(EventFilter::All, move |ev| {
            thread::sleep(Duration::from_millis(50));
            let _ = tx.send(ev.clone());
        });
        assert_eq!(listener.ingest(&scene_event(1), addr("10.0.0.5:6969")), Ingest::Dispatched(1));

        listener.stop();
        assert_eq!(listener.subscriber_count(), 0);
        // The worker was joined, so the queued event has already arrived.
        let ev = rx.try_recv().unwrap();
        assert!(matches!(ev.kind, EventKind::SceneChange { scene: 1, .. }));
        assert_eq!(listener.ingest(&scene_event(2), addr("10.0.0.5:6969")), Ingest::Dispatched(0));
    }

    #[test]
    fn bad_checksum_never_dispatched() {
        let listener = Listener::new(ListenerConfig::default());
        let rx = collect(&listener, EventFilter::All);
        let mut wire = scene_event(4);
        let last = wire.len() - 1;
        wire[last] ^= 0x01;
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Dropped);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(listener.stats().dropped, 1);
    }

    #[test]
    fn unknown_event_code_dropped() {
        let listener = Listener::new(ListenerConfig::default());
        let wire = EventFrame { mac: MAC, target: 1, code: 0x03, payload: vec![0] }.encode();
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:6969")), Ingest::Dropped);
    }

    #[test]
    fn response_frames_ignored() {
        let listener = Listener::new(ListenerConfig::default());
        let wire = crate::frame::ResponseFrame {
            kind: crate::frame::ResponseKind::Ok,
            seq: 1,
            data: vec![],
        }
        .encode();
        assert_eq!(listener.ingest(&wire, addr("10.0.0.5:5108")), Ingest::Ignored);
    }

    #[test]
    fn filter_by_type() {
        let listener = Listener::new(ListenerConfig::default());
        let scenes = collect(&listener, EventFilter::Only(EventType::SceneChange));
        let levels = collect(&listener, EventFilter::Only(EventType::LevelChange));

        assert_eq!(listener.ingest(&level_event(128), addr("10.0.0.5:6969")), Ingest::Dispatched(1));
        let ev = levels.recv_timeout(WAIT).unwrap();
        assert_eq!(ev.kind, EventKind::LevelChange { target: Address::Gear(3), level: 128 });
        assert!(scenes.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn panicking_or_slow_subscriber_does_not_block_others() {
        let listener = Listener::new(ListenerConfig::default());
        listener.subscribe(EventFilter::All, |_| panic!("boom"));
        listener.subscribe(EventFilter::All, |_| thread::sleep(Duration::from_millis(300)));
        let rx = collect(&listener, EventFilter::All);

        listener.ingest(&scene_event(1), addr("10.0.0.5:6969"));
        listener.ingest(&scene_event(2), addr("10.0.0.5:6969"));

        let a = rx.recv_timeout(WAIT).unwrap();
        let b = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(a.kind, EventKind::SceneChange { scene: 1, .. }));
        assert!(matches!(b.kind, EventKind::SceneChange { scene: 2, .. }));
        assert_eq!(listener.subscriber_count(), 3);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let listener = Listener::new(ListenerConfig::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = listener.subscribe(EventFilter::All, move |ev| {
            let _ = tx.send(ev.clone());
        });
        assert!(listener.unsubscribe(id));
        assert!(!listener.unsubscribe(id));
        assert_eq!(listener.ingest(&scene_event(1), addr("10.0.0.5:6969")), Ingest::Dispatched(0));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn receives_unicast_datagrams() {
        let config = ListenerConfig::default()
            .with_multicast(false)
            .with_unicast(addr("127.0.0.1:0"))
            .with_poll_interval(Duration::from_millis(20));
        let listener = Listener::new(config);
        let rx = collect(&listener, EventFilter::All);
        listener.start().unwrap();
        let target = listener.local_addrs()[0];

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&scene_event(7), target).unwrap();

        let ev = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(ev.kind, EventKind::SceneChange { scene: 7, .. }));
        assert_eq!(ev.controller.addr, sender.local_addr().unwrap());
        listener.stop();
        assert!(listener.local_addrs().is_empty());
    }
}
