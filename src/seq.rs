//! Sequence numbers and the pending-request table.
//!
//! Each controller session owns one [`SequenceTracker`]. It hands out 8-bit
//! sequence numbers and holds one [`PendingRequest`] per command awaiting a
//! response. Register, resolve, retry, and expire all run under one lock,
//! so the sender and the receive thread never observe a half-updated entry.

use std::collections::HashMap;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::protocol::response::Response;

/// One in-flight command.
#[derive(Debug)]
pub struct PendingRequest {
    pub seq: u8,
    pub issued: Instant,
    pub deadline: Instant,
    /// Retransmissions so far.
    pub retries: u32,
    slot: Sender<Response>,
}

/// Waiting side of a registered request.
///
/// The slot disconnects if the entry is removed without a response
/// (expiry or session close).
#[derive(Debug)]
pub struct PendingHandle {
    seq: u8,
    rx: Receiver<Response>,
}

/// Why a wait on a [`PendingHandle`] ended without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline passed; the entry is still registered.
    Timeout,
    /// The entry was removed without a response.
    Dropped,
}

impl PendingHandle {
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// Block until a response arrives or `deadline` passes.
    pub fn wait_until(&self, deadline: Instant) -> Result<Response, WaitError> {
        self.rx.recv_deadline(deadline).map_err(|e| match e {
            RecvTimeoutError::Timeout => WaitError::Timeout,
            RecvTimeoutError::Disconnected => WaitError::Dropped,
        })
    }

    /// Take a response that has already been delivered.
    pub fn try_take(&self) -> Option<Response> {
        match self.rx.try_recv() {
            Ok(r) => Some(r),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

struct Inner {
    next_seq: u8,
    pending: HashMap<u8, PendingRequest>,
}

/// Sequence allocator and pending-request table for one controller.
pub struct SequenceTracker {
    inner: Mutex<Inner>,
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Start allocation at `seq`.
    pub fn starting_at(seq: u8) -> Self {
        Self {
            inner: Mutex::new(Inner { next_seq: seq, pending: HashMap::new() }),
        }
    }

    /// Allocate the next sequence number. Wraps 255 -> 0 and skips numbers
    /// that are still pending.
    pub fn next(&self) -> u8 {
        let mut inner = self.inner.lock();
        for _ in 0..=u8::MAX {
            let seq = inner.next_seq;
            inner.next_seq = seq.wrapping_add(1);
            if !inner.pending.contains_key(&seq) {
                return seq;
            }
        }
        // All 256 in flight: reuse the oldest slot in rotation.
        let seq = inner.next_seq;
        inner.next_seq = seq.wrapping_add(1);
        seq
    }

    /// Register a request under `seq`. A stale entry with the same number
    /// is dropped and its waiter released.
    pub fn register(&self, seq: u8, deadline: Instant) -> PendingHandle {
        let (slot, rx) = crossbeam_channel::bounded(1);
        let req = PendingRequest {
            seq,
            issued: Instant::now(),
            deadline,
            retries: 0,
            slot,
        };
        if self.inner.lock().pending.insert(seq, req).is_some() {
            log::debug!("seq {seq} re-registered while still pending");
        }
        PendingHandle { seq, rx }
    }

    /// Complete the request waiting on `response.seq`. Returns false when
    /// nothing is waiting (unknown, late, or duplicate response).
    pub fn resolve(&self, response: Response) -> bool {
        let Some(req) = self.inner.lock().pending.remove(&response.seq) else {
            return false;
        };
        // The waiter may have given up already; nothing to do then.
        let _ = req.slot.try_send(response);
        true
    }

    /// Record a retransmission and move the deadline. Returns the new retry
    /// count, or `None` if the request is no longer pending.
    pub fn retry(&self, seq: u8, deadline: Instant) -> Option<u32> {
        let mut inner = self.inner.lock();
        let req = inner.pending.get_mut(&seq)?;
        req.retries += 1;
        req.deadline = deadline;
        Some(req.retries)
    }

    /// Remove and return every request whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> Vec<PendingRequest> {
        let mut inner = self.inner.lock();
        let due: Vec<u8> = inner
            .pending
            .values()
            .filter(|r| r.deadline <= now)
            .map(|r| r.seq)
            .collect();
        due.into_iter()
            .filter_map(|seq| inner.pending.remove(&seq))
            .collect()
    }

    /// Drop every pending request, releasing all waiters.
    pub fn fail_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.pending.len();
        inner.pending.clear();
        n
    }

    pub fn is_pending(&self, seq: u8) -> bool {
        self.inner.lock().pending.contains_key(&seq)
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::frame::ResponseKind;

    fn ok(seq: u8) -> Response {
        Response { kind: ResponseKind::Ok, seq, data: vec![] }
    }

    #[test]
    fn sequence_increases_and_wraps() {
        let t = SequenceTracker::starting_at(250);
        let seqs: Vec<u8> = (0..10).map(|_| t.next()).collect();
        assert_eq!(seqs, vec![250, 251, 252, 253, 254, 255, 0, 1, 2, 3]);
        for pair in seqs.windows(2) {
            assert_eq!(pair[1], pair[0].wrapping_add(1));
        }
    }

    #[test]
    fn full_cycle_visits_every_number() {
        let t = SequenceTracker::new();
        let mut seen = [false; 256];
        for _ in 0..256 {
            seen[t.next() as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(t.next(), 0);
    }

    #[test]
    fn next_skips_pending_numbers() {
        let t = SequenceTracker::starting_at(7);
        let _h = t.register(8, Instant::now() + Duration::from_secs(1));
        assert_eq!(t.next(), 7);
        assert_eq!(t.next(), 9);
    }

    #[test]
    fn resolve_delivers_and_removes() {
        let t = SequenceTracker::new();
        let h = t.register(5, Instant::now() + Duration::from_secs(1));
        assert!(t.resolve(ok(5)));
        assert!(!t.is_pending(5));
        assert_eq!(h.try_take().unwrap().seq, 5);
        // Duplicate is a no-op.
        assert!(!t.resolve(ok(5)));
    }

    #[test]
    fn unknown_response_leaves_pending_alone() {
        let t = SequenceTracker::new();
        let h = t.register(1, Instant::now() + Duration::from_secs(1));
        assert!(!t.resolve(ok(2)));
        assert!(t.is_pending(1));
        assert!(h.try_take().is_none());
    }

    #[test]
    fn retry_moves_deadline() {
        let t = SequenceTracker::new();
        let now = Instant::now();
        let _h = t.register(9, now);
        assert_eq!(t.retry(9, now + Duration::from_secs(5)), Some(1));
        assert_eq!(t.retry(9, now + Duration::from_secs(5)), Some(2));
        assert!(t.expire(now + Duration::from_secs(1)).is_empty());
        assert_eq!(t.retry(10, now), None);
    }

    #[test]
    fn expire_removes_due_entries() {
        let t = SequenceTracker::new();
        let now = Instant::now();
        let h = t.register(1, now);
        let _h2 = t.register(2, now + Duration::from_secs(60));
        let expired = t.expire(now);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].seq, 1);
        drop(expired);
        assert_eq!(t.pending_len(), 1);
        assert_eq!(h.wait_until(Instant::now()), Err(WaitError::Dropped));
    }

    #[test]
    fn wait_times_out() {
        let t = SequenceTracker::new();
        let h = t.register(3, Instant::now());
        let r = h.wait_until(Instant::now() + Duration::from_millis(20));
        assert_eq!(r, Err(WaitError::Timeout));
        assert!(t.is_pending(3));
    }

    #[test]
    fn fail_all_releases_waiters() {
        let t = SequenceTracker::new();
        let h = t.register(1, Instant::now() + Duration::from_secs(10));
        assert_eq!(t.fail_all(), 1);
        assert_eq!(h.wait_until(Instant::now() + Duration::from_secs(1)), Err(WaitError::Dropped));
    }

    #[test]
    fn resolve_from_other_thread() {
        let t = std::sync::Arc::new(SequenceTracker::new());
        let h = t.register(42, Instant::now() + Duration::from_secs(5));
        let t2 = t.clone();
        let th = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            t2.resolve(ok(42))
        });
        let r = h.wait_until(Instant::now() + Duration::from_secs(5)).unwrap();
        assert_eq!(r.seq, 42);
        assert!(th.join().unwrap());
    }
}
