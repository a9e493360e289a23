//! Connection/session lifecycle state.
//!
//! The state machine is `Disconnected → Connecting → Connected`, with
//! streaming as a sub-flag of Connected rather than a separate top state.
//! Transitions are only ever driven by the client's actor task; the fail-
//! fast rules for `connect()` live here so they can be tested without a
//! socket.

use std::net::SocketAddr;
use std::time::Instant;

use crate::error::ClientError;

/// Lifecycle state of the device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected { streaming: bool },
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }

    pub fn is_streaming(self) -> bool {
        matches!(self, SessionState::Connected { streaming: true })
    }
}

/// The one connection the client owns, including the session token handed
/// out by the device during the handshake.
pub(crate) struct Connection {
    pub state: SessionState,
    pub device_addr: SocketAddr,
    pub token: Option<i64>,
    pub last_activity: Instant,
}

impl Connection {
    pub fn new(device_addr: SocketAddr) -> Self {
        Self {
            state: SessionState::Disconnected,
            device_addr,
            token: None,
            last_activity: Instant::now(),
        }
    }

    /// Enters Connecting, rejecting the attempt when one is already
    /// underway or established.
    pub fn begin_connect(&mut self) -> Result<(), ClientError> {
        match self.state {
            SessionState::Disconnected => {
                self.state = SessionState::Connecting;
                self.touch();
                Ok(())
            }
            SessionState::Connecting => Err(ClientError::AlreadyConnecting),
            SessionState::Connected { .. } => Err(ClientError::AlreadyConnected),
        }
    }

    /// Records the session token and enters Connected.
    pub fn complete_handshake(&mut self, token: i64) {
        debug_assert_eq!(self.state, SessionState::Connecting);
        self.token = Some(token);
        self.state = SessionState::Connected { streaming: false };
        self.touch();
    }

    /// Sets or clears the streaming sub-flag; meaningless outside Connected.
    pub fn set_streaming(&mut self, streaming: bool) {
        if self.state.is_connected() {
            self.state = SessionState::Connected { streaming };
        }
    }

    /// Returns to Disconnected, dropping the token and streaming flag.
    pub fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.token = None;
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
