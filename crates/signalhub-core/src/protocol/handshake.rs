//! Connection handshake: the first text frame a client sends.

use serde::Deserialize;

use crate::error::{HubError, Result};

/// Only supported hub protocol name.
pub const HANDSHAKE_PROTOCOL: &str = "json";

/// `{"protocol":"json","version":1}`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandshakeRequest {
    pub protocol: String,
    pub version: u32,
}

/// Parse and validate a handshake frame.
pub fn parse_handshake(s: &str) -> Result<HandshakeRequest> {
    let req: HandshakeRequest = serde_json::from_str(s)
        .map_err(|e| HubError::HandshakeFailed(format!("invalid handshake json: {e}")))?;
    if req.protocol != HANDSHAKE_PROTOCOL {
        return Err(HubError::HandshakeFailed(format!(
            "unsupported protocol: {}",
            req.protocol
        )));
    }
    if req.version != u32::from(super::PROTOCOL_VERSION) {
        return Err(HubError::UnsupportedVersion);
    }
    Ok(req)
}
