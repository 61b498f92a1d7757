//! Per-connection lifecycle state machine.
//!
//! `Connecting -> Connected -> Disconnecting -> Closed`
//!
//! Any non-terminal state may move to `Disconnecting`. `Closed` is terminal.
//! Transitions are compare-and-swap on an atomic so the session task and the
//! hub (overflow, shutdown) can race without a lock; the loser gets an error.

use std::sync::atomic::{AtomicU8, Ordering};

use signalhub_core::error::{HubError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Connecting = 0,
    Connected = 1,
    Disconnecting = 2,
    Closed = 3,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Closed => "closed",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Connecting,
            1 => SessionState::Connected,
            2 => SessionState::Disconnecting,
            _ => SessionState::Closed,
        }
    }

    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Connected)
                | (Connecting, Disconnecting)
                | (Connected, Disconnecting)
                | (Disconnecting, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

/// Why a connection left `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client sent a close frame or the stream ended.
    ClientClosed,
    /// Read/write error on the socket.
    TransportError,
    IdleTimeout,
    HandshakeFailed,
    /// Outbound queue overflowed under the `disconnect` policy.
    Overflow,
    /// Policy violation (frame too large, rate limited).
    Policy,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::TransportError => "transport_error",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::HandshakeFailed => "handshake_failed",
            CloseReason::Overflow => "overflow",
            CloseReason::Policy => "policy",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Connecting as u8),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next`, returning the previous state. Illegal moves are errors
    /// and leave the state untouched.
    pub fn transition(&self, next: SessionState) -> Result<SessionState> {
        let mut cur = self.state.load(Ordering::Acquire);
        loop {
            let from = SessionState::from_u8(cur);
            if !from.can_transition_to(next) {
                return Err(HubError::InvalidState {
                    from: from.as_str(),
                    to: next.as_str(),
                });
            }
            match self.state.compare_exchange(
                cur,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(from),
                Err(actual) => cur = actual,
            }
        }
    }
}
