//! UDP command session with one controller.
//!
//! A [`Session`] owns a UDP socket connected to the controller's command
//! port and a receive thread that matches responses to pending requests by
//! sequence number. Datagrams the session cannot match (late responses,
//! events sent to the command socket) go to an optional [`DatagramSink`],
//! normally the event listener.

use std::fmt;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use parking_lot::{Mutex, RwLock};

use crate::addr::{Address, ControllerIdentity};
use crate::codec;
use crate::config::SessionConfig;
use crate::error::WireError;
use crate::frame::{Packet, ResponseKind};
use crate::protocol::Command;
use crate::protocol::query::Answer;
use crate::protocol::response::{ErrorCode, Response};
use crate::protocol::tpi::EventMode;
use crate::seq::{SequenceTracker, WaitError};

/// Largest datagram a controller sends.
const RECV_BUF: usize = 512;
/// Pause after a socket error before reading again.
const ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Errors from session operations.
#[derive(Debug)]
pub enum SessionError {
    /// Socket I/O error.
    Io(io::Error),
    /// Answer data did not decode.
    Wire(WireError),
    /// No response after every attempt.
    NoResponse {
        command: &'static str,
        target: Address,
        attempts: u32,
    },
    /// The session was closed before or while the command was in flight.
    Closed,
    /// The controller answered with an ERROR response.
    Rejected { command: &'static str, code: ErrorCode },
    /// The response kind does not fit the command (e.g. OK to a query).
    UnexpectedResponse { command: &'static str, kind: ResponseKind },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Io(e) => write!(f, "I/O error: {e}"),
            SessionError::Wire(e) => write!(f, "wire error: {e}"),
            SessionError::NoResponse { command, target, attempts } => {
                write!(f, "no response to {command} ({target}) after {attempts} attempts")
            }
            SessionError::Closed => write!(f, "session closed"),
            SessionError::Rejected { command, code } => write!(f, "{command} rejected: {code}"),
            SessionError::UnexpectedResponse { command, kind } => {
                write!(f, "unexpected {kind:?} response to {command}")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Io(e) => Some(e),
            SessionError::Wire(e) => Some(e),
            SessionError::NoResponse { .. }
            | SessionError::Closed
            | SessionError::Rejected { .. }
            | SessionError::UnexpectedResponse { .. } => None,
        }
    }
}

impl From<io::Error> for SessionError {
    fn from(e: io::Error) -> Self {
        SessionError::Io(e)
    }
}

impl From<WireError> for SessionError {
    fn from(e: WireError) -> Self {
        SessionError::Wire(e)
    }
}

/// Receiver for datagrams a session could not match to a request.
pub trait DatagramSink: Send + Sync {
    fn deliver(&self, datagram: &[u8], from: SocketAddr);
}

/// Command session with one controller.
///
/// `send` blocks the caller until a response arrives or every attempt has
/// timed out. Commands on one session are serialized; sessions for
/// different controllers run independently.
///
/// # Example
///
/// ```no_run
/// use zentpi::{Address, Command, ControllerIdentity, Session, SessionConfig};
///
/// let id = ControllerIdentity::new("192.168.1.50:5108".parse().unwrap());
/// let session = Session::open(id, SessionConfig::default())?;
/// session.execute(&Command::arc_level(Address::Group(2), 200)?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Session {
    identity: ControllerIdentity,
    config: SessionConfig,
    socket: RwLock<Option<Arc<UdpSocket>>>,
    local_addr: SocketAddr,
    tracker: Arc<SequenceTracker>,
    send_lock: Mutex<()>,
    closed: AtomicBool,
    stop: Arc<AtomicBool>,
    rx_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Open a session. Unmatched datagrams are logged and dropped.
    pub fn open(identity: ControllerIdentity, config: SessionConfig) -> Result<Self, SessionError> {
        Self::open_with_sink(identity, config, None)
    }

    /// Open a session that forwards unmatched datagrams to `sink`.
    pub fn open_with_sink(
        identity: ControllerIdentity,
        config: SessionConfig,
        sink: Option<Arc<dyn DatagramSink>>,
    ) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind(config.bind)?;
        socket.connect(identity.addr)?;
        socket.set_read_timeout(Some(config.poll_interval))?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let tracker = Arc::new(SequenceTracker::starting_at(config.initial_seq));
        let stop = Arc::new(AtomicBool::new(false));

        let rx_thread = {
            let socket = socket.clone();
            let tracker = tracker.clone();
            let stop = stop.clone();
            let peer = identity;
            thread::Builder::new()
                .name(format!("tpi-session-{}", identity.addr))
                .spawn(move || receive_loop(&socket, &tracker, &stop, sink.as_deref(), peer))?
        };

        info!("session open: {identity} via {local_addr}");
        Ok(Self {
            identity,
            config,
            socket: RwLock::new(Some(socket)),
            local_addr,
            tracker,
            send_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            stop,
            rx_thread: Mutex::new(Some(rx_thread)),
        })
    }

    pub fn identity(&self) -> ControllerIdentity {
        self.identity
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Local address of the command socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a command and wait for its response.
    ///
    /// The command is retransmitted with the same sequence number after each
    /// timeout, up to the configured retry count.
    pub fn send(&self, cmd: &Command) -> Result<Response, SessionError> {
        let _guard = self.send_lock.lock();
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let socket = self.socket.read().clone().ok_or(SessionError::Closed)?;

        let seq = self.tracker.next();
        let wire = cmd.encode(seq).encode();
        let max_attempts = self.config.retries + 1;
        let mut deadline = Instant::now() + self.config.timeout;
        let handle = self.tracker.register(seq, deadline);

        trace!("{} -> {cmd:?} seq {seq} | {}", self.identity, codec::hex(&wire));
        transmit(&socket, &wire, &self.identity);
        let mut attempts = 1;

        loop {
            match handle.wait_until(deadline) {
                Ok(resp) => {
                    trace!("{} <- {resp:?}", self.identity);
                    return Ok(resp);
                }
                Err(WaitError::Dropped) => {
                    return handle.try_take().ok_or(SessionError::Closed);
                }
                Err(WaitError::Timeout) if attempts >= max_attempts => {
                    self.tracker.expire(Instant::now());
                    // A response may have landed between the timeout and expiry.
                    if let Some(resp) = handle.try_take() {
                        return Ok(resp);
                    }
                    debug!("{}: {cmd} seq {seq} timed out after {attempts} attempts", self.identity);
                    return Err(SessionError::NoResponse {
                        command: cmd.name(),
                        target: cmd.target(),
                        attempts,
                    });
                }
                Err(WaitError::Timeout) => {
                    deadline = Instant::now() + self.config.timeout;
                    if self.tracker.retry(seq, deadline).is_none() {
                        return handle.try_take().ok_or(SessionError::Closed);
                    }
                    attempts += 1;
                    debug!("{}: retransmit {cmd} seq {seq} (attempt {attempts})", self.identity);
                    transmit(&socket, &wire, &self.identity);
                }
            }
        }
    }

    /// Send a command that expects OK. Returns `false` for NO_ANSWER.
    pub fn execute(&self, cmd: &Command) -> Result<bool, SessionError> {
        let resp = self.send(cmd)?;
        match resp.kind {
            ResponseKind::Ok | ResponseKind::Answer => Ok(true),
            ResponseKind::NoAnswer => Ok(false),
            ResponseKind::Error => Err(rejected(cmd, &resp)),
        }
    }

    /// Send a query and decode its answer. NO_ANSWER yields `None`.
    pub fn query<T: Answer>(&self, cmd: &Command) -> Result<Option<T>, SessionError> {
        let resp = self.send(cmd)?;
        match resp.kind {
            ResponseKind::Answer => Ok(Some(T::decode_answer(&resp.data)?)),
            ResponseKind::NoAnswer => Ok(None),
            ResponseKind::Error => Err(rejected(cmd, &resp)),
            kind @ ResponseKind::Ok => Err(SessionError::UnexpectedResponse { command: cmd.name(), kind }),
        }
    }

    /// Set the controller's event emission mode. The controller answers with
    /// the mode byte it applied; returns `true` only when that matches.
    pub fn enable_event_emit(&self, mode: EventMode) -> Result<bool, SessionError> {
        let cmd = Command::enable_event_emit(mode);
        let resp = self.send(&cmd)?;
        match resp.kind {
            ResponseKind::Answer => {
                let applied = resp.data.first().copied();
                if applied != Some(mode.to_byte()) {
                    warn!("{}: event mode {:?} requested, controller reports {applied:?}", self.identity, mode);
                    return Ok(false);
                }
                Ok(true)
            }
            ResponseKind::Ok | ResponseKind::NoAnswer => Ok(false),
            ResponseKind::Error => Err(rejected(&cmd, &resp)),
        }
    }

    /// Close the session: stop the receive thread, release the socket, and
    /// fail every pending request with [`SessionError::Closed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.rx_thread.lock().take() {
            let _ = handle.join();
        }
        self.socket.write().take();
        let failed = self.tracker.fail_all();
        info!("session closed: {} ({failed} pending failed)", self.identity);
    }

    #[cfg(test)]
    pub(crate) fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("local_addr", &self.local_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn rejected(cmd: &Command, resp: &Response) -> SessionError {
    SessionError::Rejected {
        command: cmd.name(),
        code: resp.error_code().unwrap_or(ErrorCode::Unknown(0)),
    }
}

/// A failed send is treated as a lost datagram; the retry loop covers it.
fn transmit(socket: &UdpSocket, wire: &[u8], peer: &ControllerIdentity) {
    if let Err(e) = socket.send(wire) {
        warn!("{peer}: send failed: {e}");
    }
}

/// How long a receive loop should pause after `err`. Read timeouts are the
/// normal idle wake-up and get no pause.
pub(crate) fn recv_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => None,
        _ => Some(ERROR_BACKOFF),
    }
}

fn receive_loop(
    socket: &UdpSocket,
    tracker: &SequenceTracker,
    stop: &AtomicBool,
    sink: Option<&dyn DatagramSink>,
    peer: ControllerIdentity,
) {
    let mut buf = [0u8; RECV_BUF];
    while !stop.load(Ordering::Acquire) {
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) => {
                // ICMP port-unreachable surfaces here on connected sockets.
                if let Some(pause) = recv_backoff(&e) {
                    debug!("{peer}: recv error: {e}");
                    thread::sleep(pause);
                }
                continue;
            }
        };
        let datagram = &buf[..n];
        match Packet::parse(datagram) {
            Ok(Packet::Response(frame)) => {
                let seq = frame.seq;
                if !tracker.resolve(frame.into()) {
                    debug!("{peer}: unmatched response seq {seq}");
                    if let Some(sink) = sink {
                        sink.deliver(datagram, from);
                    }
                }
            }
            Ok(Packet::Event(_)) => {
                if let Some(sink) = sink {
                    sink.deliver(datagram, from);
                }
            }
            Ok(Packet::Request(_)) => debug!("{peer}: ignoring request frame from {from}"),
            Err(e) => debug!("{peer}: dropping datagram from {from}: {e} | {}", codec::hex(datagram)),
        }
    }
    trace!("{peer}: receive thread exiting");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use crate::frame::ResponseFrame;
    use crate::protocol::query::Version;

    /// Loopback stand-in for a controller's command port.
    pub(crate) struct FakeController {
        pub socket: UdpSocket,
    }

    impl FakeController {
        pub fn new() -> Self {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
            Self { socket }
        }

        pub fn addr(&self) -> SocketAddr {
            self.socket.local_addr().unwrap()
        }

        pub fn identity(&self) -> ControllerIdentity {
            ControllerIdentity::new(self.addr())
        }

        /// Receive one request; returns (seq, command, body, client addr).
        pub fn recv(&self) -> (u8, u8, Vec<u8>, SocketAddr) {
            let mut buf = [0u8; 512];
            let (n, from) = self.socket.recv_from(&mut buf).unwrap();
            match Packet::parse(&buf[..n]).unwrap() {
                Packet::Request(r) => (r.seq, r.command, r.body, from),
                other => panic!("expected request, got {other:?}"),
            }
        }

        pub fn reply(&self, to: SocketAddr, kind: ResponseKind, seq: u8, data: &[u8]) {
            let wire = ResponseFrame { kind, seq, data: data.to_vec() }.encode();
            self.socket.send_to(&wire, to).unwrap();
        }
    }

    pub(crate) fn test_config() -> SessionConfig {
        SessionConfig::default()
            .with_bind("127.0.0.1:0".parse().unwrap())
            .with_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(20))
    }

    #[derive(Default)]
    struct CollectSink(Mutex<Vec<Vec<u8>>>);

    impl DatagramSink for CollectSink {
        fn deliver(&self, datagram: &[u8], _from: SocketAddr) {
            self.0.lock().push(datagram.to_vec());
        }
    }

    #[test]
    fn socket_errors_back_off_but_timeouts_do_not() {
        assert_eq!(recv_backoff(&io::Error::from(io::ErrorKind::WouldBlock)), None);
        assert_eq!(recv_backoff(&io::Error::from(io::ErrorKind::TimedOut)), None);
        assert_eq!(
            recv_backoff(&io::Error::from(io::ErrorKind::ConnectionRefused)),
            Some(ERROR_BACKOFF)
        );
        assert_eq!(recv_backoff(&io::Error::other("network down")), Some(ERROR_BACKOFF));
    }

    #[test]
    fn level_set_resolves_matching_response() {
        let ctrl = FakeController::new();
        let session = Session::open(ctrl.identity(), test_config().with_initial_seq(5)).unwrap();

        let responder = thread::spawn(move || {
            let (seq, cmd, body, from) = ctrl.recv();
            assert_eq!(seq, 5);
            assert_eq!(cmd, 0xA2);
            assert_eq!(body[0], 70);
            ctrl.reply(from, ResponseKind::Ok, seq, &[]);
        });

        let cmd = Command::arc_level(Address::Group(6), 0xFE).unwrap();
        let resp = session.send(&cmd).unwrap();
        assert_eq!(resp.kind, ResponseKind::Ok);
        assert_eq!(resp.seq, 5);
        assert_eq!(session.tracker().pending_len(), 0);
        responder.join().unwrap();
    }

    #[test]
    fn retries_with_same_seq_then_fails() {
        let ctrl = FakeController::new();
        let config = test_config().with_timeout(Duration::from_millis(50)).with_retries(2);
        let session = Session::open(ctrl.identity(), config).unwrap();

        let cmd = Command::query_level(Address::Gear(3)).unwrap();
        match session.send(&cmd) {
            Err(SessionError::NoResponse { command, target, attempts }) => {
                assert_eq!(command, "query level");
                assert_eq!(target, Address::Gear(3));
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(session.tracker().pending_len(), 0);

        ctrl.socket.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let mut seqs = Vec::new();
        let mut buf = [0u8; 64];
        while let Ok((n, _)) = ctrl.socket.recv_from(&mut buf) {
            seqs.push(buf[1]);
            assert_eq!(buf[2], 0xAA);
            assert!(n >= 4);
        }
        assert_eq!(seqs, vec![0, 0, 0]);
    }

    #[test]
    fn unmatched_response_goes_to_sink() {
        let ctrl = FakeController::new();
        let sink = Arc::new(CollectSink::default());
        let session =
            Session::open_with_sink(ctrl.identity(), test_config(), Some(sink.clone())).unwrap();

        let responder = thread::spawn(move || {
            let (seq, _, _, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::Answer, seq.wrapping_add(1), &[0x11]);
            thread::sleep(Duration::from_millis(20));
            ctrl.reply(from, ResponseKind::Answer, seq, &[0x22]);
        });

        let resp = session.send(&Command::query_level(Address::Gear(1)).unwrap()).unwrap();
        assert_eq!(resp.data, vec![0x22]);
        responder.join().unwrap();

        let got = sink.0.lock();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0][1], 1);
    }

    #[test]
    fn sessions_do_not_cross_resolve() {
        let a = FakeController::new();
        let b = FakeController::new();
        let sa = Arc::new(Session::open(a.identity(), test_config()).unwrap());
        let sb = Arc::new(Session::open(b.identity(), test_config()).unwrap());

        let ra = thread::spawn(move || {
            let (seq, _, _, from) = a.recv();
            a.reply(from, ResponseKind::Answer, seq, &[0xAA]);
        });
        let rb = thread::spawn(move || {
            let (seq, _, _, from) = b.recv();
            b.reply(from, ResponseKind::Answer, seq, &[0xBB]);
        });

        let cmd = Command::query_level(Address::Gear(1)).unwrap();
        let (sa2, cmd2) = (sa.clone(), cmd.clone());
        let ta = thread::spawn(move || sa2.send(&cmd2).unwrap());
        let rb_resp = sb.send(&cmd).unwrap();
        let ra_resp = ta.join().unwrap();

        assert_eq!(ra_resp.seq, rb_resp.seq);
        assert_eq!(ra_resp.data, vec![0xAA]);
        assert_eq!(rb_resp.data, vec![0xBB]);
        ra.join().unwrap();
        rb.join().unwrap();
    }

    #[test]
    fn typed_query_and_rejection() {
        let ctrl = FakeController::new();
        let session = Session::open(ctrl.identity(), test_config()).unwrap();

        let responder = thread::spawn(move || {
            let (seq, _, _, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::Answer, seq, &[2, 1, 14]);
            let (seq, _, _, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::Error, seq, &[0xB8]);
            let (seq, _, _, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::NoAnswer, seq, &[]);
        });

        let v: Version = session.query(&Command::query_controller_version()).unwrap().unwrap();
        assert_eq!(v.to_string(), "2.1.14");

        match session.execute(&Command::off(Address::Gear(9)).unwrap()) {
            Err(SessionError::Rejected { code, .. }) => assert_eq!(code, ErrorCode::UnknownTarget),
            other => panic!("unexpected: {other:?}"),
        }

        let none: Option<u8> = session.query(&Command::query_level(Address::Gear(9)).unwrap()).unwrap();
        assert_eq!(none, None);
        responder.join().unwrap();
    }

    #[test]
    fn event_emit_checks_echoed_mode() {
        let ctrl = FakeController::new();
        let session = Session::open(ctrl.identity(), test_config()).unwrap();
        let mode = EventMode::default();

        let responder = thread::spawn(move || {
            let (seq, _, body, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::Answer, seq, &[body[0]]);
            let (seq, _, _, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::Answer, seq, &[0x00]);
            let (seq, _, _, from) = ctrl.recv();
            ctrl.reply(from, ResponseKind::Ok, seq, &[]);
        });

        assert!(session.enable_event_emit(mode).unwrap());
        assert!(!session.enable_event_emit(mode).unwrap());
        assert!(!session.enable_event_emit(mode).unwrap());
        responder.join().unwrap();
    }

    #[test]
    fn close_fails_in_flight_and_later_sends() {
        let ctrl = FakeController::new();
        let config = test_config().with_timeout(Duration::from_secs(5)).with_retries(0);
        let session = Arc::new(Session::open(ctrl.identity(), config).unwrap());

        let s2 = session.clone();
        let sender = thread::spawn(move || s2.send(&Command::query_dali_ready()));
        // Wait until the request is on the wire.
        let _ = ctrl.recv();
        session.close();

        assert!(matches!(sender.join().unwrap(), Err(SessionError::Closed)));
        assert!(matches!(session.send(&Command::query_dali_ready()), Err(SessionError::Closed)));
        assert!(session.is_closed());
    }
}
