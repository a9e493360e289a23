//! Pending-request bookkeeping.
//!
//! One entry per outstanding request, keyed by the correlation id the
//! device echoes back. The map is owned exclusively by the client's actor
//! task; nothing here locks. Responses resolve strictly by `seq`, a frame
//! with an unknown or already-resolved id is the caller's anomaly to drop,
//! and disconnecting drains every entry so nothing leaks.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::time::Instant;

use vision_core::protocol::messages::{OpCode, Response};

use crate::error::ClientError;

/// One outstanding request awaiting its response or deadline.
pub(crate) struct PendingRequest {
    pub seq: u64,
    pub op: OpCode,
    pub issued_at: Instant,
    pub deadline: Instant,
    /// Caller-supplied context echoed into events (e.g. the file name of a
    /// delete).
    pub context: Option<String>,
    /// Resolution sink; `None` for fire-and-forget internal requests such
    /// as the heartbeat.
    pub reply: Option<oneshot::Sender<Result<Response, ClientError>>>,
}

impl PendingRequest {
    /// Sends the final result to the waiting caller, if any is listening.
    pub fn resolve(self, result: Result<Response, ClientError>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(result);
        }
    }
}

/// The set of outstanding requests.
#[derive(Default)]
pub(crate) struct PendingRequests {
    entries: HashMap<u64, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, entry: PendingRequest) {
        debug_assert!(
            !self.entries.contains_key(&entry.seq),
            "correlation ids are unique among pending requests"
        );
        self.entries.insert(entry.seq, entry);
    }

    /// Removes and returns the entry matching `seq`, if one is pending.
    pub fn resolve(&mut self, seq: u64) -> Option<PendingRequest> {
        self.entries.remove(&seq)
    }

    /// Whether any stream-control request is currently outstanding.
    pub fn stream_control_in_flight(&self) -> bool {
        self.entries.values().any(|e| e.op.is_stream_control())
    }

    /// The earliest deadline among pending requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    /// Removes and returns every entry whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<PendingRequest> {
        let due: Vec<u64> = self
            .entries
            .values()
            .filter(|e| e.deadline <= now)
            .map(|e| e.seq)
            .collect();
        due.into_iter()
            .filter_map(|seq| self.entries.remove(&seq))
            .collect()
    }

    /// Removes and returns every entry, e.g. on disconnect.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.entries.drain().map(|(_, e)| e).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
