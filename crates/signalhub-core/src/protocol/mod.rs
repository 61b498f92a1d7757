//! Protocol modules (text + binary lanes, plus the connection handshake).
//!
//! - Text lane: JSON envelopes whose `data` stays a `RawValue` until a handler
//!   needs it, so relayed payloads are never re-parsed.
//! - Binary lane: fixed header frames carrying an opaque payload for a group.
//!
//! All parsers are panic-free: malformed input is reported as `HubError`
//! instead of panicking or indexing raw buffers.

pub mod binary;
pub mod handshake;
pub mod text;

/// Wire protocol version carried in every envelope and binary frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Longest accepted group name, in bytes.
pub const MAX_GROUP_NAME_BYTES: usize = 128;

/// Validate a group name (non-empty, bounded, no control characters).
pub fn validate_group_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::HubError::BadRequest("group name must not be empty".into()));
    }
    if name.len() > MAX_GROUP_NAME_BYTES {
        return Err(crate::HubError::BadRequest(format!(
            "group name exceeds {MAX_GROUP_NAME_BYTES} bytes"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(crate::HubError::BadRequest(
            "group name contains control characters".into(),
        ));
    }
    Ok(())
}
