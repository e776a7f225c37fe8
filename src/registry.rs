//! Sessions for many controllers.
//!
//! The registry opens at most one [`Session`] per controller address and
//! hands out shared references to it. Sessions are created on first use.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::addr::{ControllerIdentity, MacAddr};
use crate::config::SessionConfig;
use crate::conn::{DatagramSink, Session, SessionError};
use crate::protocol::Command;
use crate::protocol::event::Event;
use crate::protocol::response::Response;

pub struct ControllerRegistry {
    config: SessionConfig,
    sink: Option<Arc<dyn DatagramSink>>,
    sessions: RwLock<HashMap<SocketAddr, Arc<Session>>>,
}

impl ControllerRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, sink: None, sessions: RwLock::new(HashMap::new()) }
    }

    /// Forward datagrams no session could match (events, late responses)
    /// to `sink`, normally the event listener.
    pub fn with_sink(mut self, sink: Arc<dyn DatagramSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The session for `identity`, opened on first request.
    ///
    /// Concurrent callers for the same controller get the same session.
    pub fn for_controller(&self, identity: ControllerIdentity) -> Result<Arc<Session>, SessionError> {
        if let Some(session) = self.sessions.read().get(&identity.addr) {
            return Ok(session.clone());
        }

        let mut sessions = self.sessions.write();
        // Another caller may have opened it between the two locks.
        if let Some(session) = sessions.get(&identity.addr) {
            return Ok(session.clone());
        }
        let session =
            Arc::new(Session::open_with_sink(identity, self.config.clone(), self.sink.clone())?);
        sessions.insert(identity.addr, session.clone());
        debug!("registry: added {identity} ({} controllers)", sessions.len());
        Ok(session)
    }

    /// Send `cmd` to `identity`, opening a session if needed.
    pub fn send_command(
        &self,
        identity: ControllerIdentity,
        cmd: &Command,
    ) -> Result<Response, SessionError> {
        self.for_controller(identity)?.send(cmd)
    }

    pub fn get(&self, addr: SocketAddr) -> Option<Arc<Session>> {
        self.sessions.read().get(&addr).cloned()
    }

    /// Identities of every registered controller.
    pub fn list_controllers(&self) -> Vec<ControllerIdentity> {
        self.sessions.read().values().map(|s| s.identity()).collect()
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// The registered controller that emitted `event`: matched by MAC when
    /// both sides know it, otherwise by IP address.
    pub fn identify(&self, event: &Event) -> Option<ControllerIdentity> {
        let sessions = self.sessions.read();
        if let Some(mac) = event.controller.mac {
            if let Some(found) = find_by_mac(&sessions, mac) {
                return Some(found);
            }
        }
        let ip = event.controller.addr.ip();
        sessions.values().map(|s| s.identity()).find(|id| id.addr.ip() == ip)
    }

    /// Close and remove the session for `addr`. Returns false if none existed.
    pub fn close(&self, addr: SocketAddr) -> bool {
        let Some(session) = self.sessions.write().remove(&addr) else {
            return false;
        };
        session.close();
        true
    }

    pub fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close();
        }
    }
}

impl Drop for ControllerRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

fn find_by_mac(
    sessions: &HashMap<SocketAddr, Arc<Session>>,
    mac: MacAddr,
) -> Option<ControllerIdentity> {
    sessions.values().map(|s| s.identity()).find(|id| id.mac == Some(mac))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
