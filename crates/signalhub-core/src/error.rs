//! Shared error type across signalhub crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed message.
    BadRequest,
    /// Referenced connection or group does not exist.
    NotFound,
    /// Frame exceeds the configured size limit.
    PayloadTooLarge,
    /// Per-connection rate limit exceeded.
    RateLimited,
    /// Unsupported protocol version.
    UnsupportedVersion,
    /// Handshake missing, late, or malformed.
    HandshakeFailed,
    /// Operation not valid in the connection's current lifecycle state.
    InvalidState,
    /// No inbound traffic within the idle window.
    IdleTimeout,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON error frames.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::HandshakeFailed => "HANDSHAKE_FAILED",
            ClientCode::InvalidState => "INVALID_STATE",
            ClientCode::IdleTimeout => "IDLE_TIMEOUT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, HubError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unknown connection id or group. Callers treat this as a benign no-op.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("rate limited")]
    RateLimited,
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidState { from: &'static str, to: &'static str },
    #[error("idle timeout")]
    IdleTimeout,
    #[error("internal: {0}")]
    Internal(String),
}

impl HubError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            HubError::BadRequest(_) => ClientCode::BadRequest,
            HubError::NotFound(_) => ClientCode::NotFound,
            HubError::PayloadTooLarge => ClientCode::PayloadTooLarge,
            HubError::RateLimited => ClientCode::RateLimited,
            HubError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            HubError::HandshakeFailed(_) => ClientCode::HandshakeFailed,
            HubError::InvalidState { .. } => ClientCode::InvalidState,
            HubError::IdleTimeout => ClientCode::IdleTimeout,
            HubError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Whether the error should be swallowed (logged, not surfaced to peers).
    pub fn is_benign(&self) -> bool {
        matches!(self, HubError::NotFound(_))
    }
}
