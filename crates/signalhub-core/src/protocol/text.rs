//! Text lane envelopes (JSON).
//!
//! Inbound `data` is stored as `RawValue` so relayed payloads are forwarded
//! byte-for-byte without a parse/serialize round trip.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{HubError, Result};

/// Tag of an inbound message; handlers are looked up by this key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Join,
    Leave,
    Send,
    Broadcast,
    BroadcastAll,
    Ping,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
            MessageKind::Send => "send",
            MessageKind::Broadcast => "broadcast",
            MessageKind::BroadcastAll => "broadcast_all",
            MessageKind::Ping => "ping",
        }
    }
}

/// Inbound text envelope.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Protocol version. Wider than the wire constant so any future version
    /// number decodes and is reported as unsupported.
    pub v: u32,
    /// Message kind (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Optional client sequence number, echoed back by `ping`.
    #[serde(default)]
    pub seq: Option<u64>,
    /// Target group (`join`, `leave`, `broadcast`).
    #[serde(default)]
    pub group: Option<String>,
    /// Target connection id (`send`).
    #[serde(default)]
    pub to: Option<String>,
    /// Skip the sender when broadcasting.
    #[serde(default)]
    pub exclude_self: bool,
    /// Opaque payload, stored as raw JSON.
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl Envelope {
    /// Decode and version-check an inbound text frame.
    pub fn parse(s: &str) -> Result<Self> {
        let env: Envelope = serde_json::from_str(s)
            .map_err(|e| HubError::BadRequest(format!("invalid envelope json: {e}")))?;
        if env.v != u32::from(super::PROTOCOL_VERSION) {
            return Err(HubError::UnsupportedVersion);
        }
        Ok(env)
    }

    /// Group field, validated.
    pub fn require_group(&self) -> Result<&str> {
        let g = self.group.as_deref().ok_or_else(|| {
            HubError::BadRequest(format!("{} requires group", self.kind.as_str()))
        })?;
        super::validate_group_name(g)?;
        Ok(g)
    }

    /// Target connection id.
    pub fn require_to(&self) -> Result<&str> {
        self.to
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HubError::BadRequest(format!("{} requires to", self.kind.as_str())))
    }

    pub fn data(&self) -> Option<&RawValue> {
        self.data.as_deref()
    }
}

/// Server -> client frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerKind {
    Welcome,
    Joined,
    Left,
    Message,
    Pong,
    Error,
}

/// Server -> client frame. Serialized once per fan-out.
#[derive(Debug, Serialize)]
pub struct ServerFrame<'a> {
    pub v: u8,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a RawValue>,
}

impl<'a> ServerFrame<'a> {
    pub fn new(kind: ServerKind) -> Self {
        Self {
            v: super::PROTOCOL_VERSION,
            kind,
            from: None,
            group: None,
            seq: None,
            data: None,
        }
    }

    pub fn sender(mut self, from: &'a str) -> Self {
        self.from = Some(from);
        self
    }

    pub fn group(mut self, group: &'a str) -> Self {
        self.group = Some(group);
        self
    }

    pub fn seq(mut self, seq: Option<u64>) -> Self {
        self.seq = seq;
        self
    }

    pub fn data(mut self, data: Option<&'a RawValue>) -> Self {
        self.data = data;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| HubError::Internal(format!("server frame encode failed: {e}")))
    }
}

/// `{"v":1,"type":"welcome","data":{"connection_id":...}}`
pub fn welcome_json(connection_id: &str) -> String {
    serde_json::json!({
        "v": super::PROTOCOL_VERSION,
        "type": "welcome",
        "data": { "connection_id": connection_id }
    })
    .to_string()
}

/// `{"v":1,"type":"error","data":{"code":...,"msg":...}}`
pub fn error_json(code: &str, msg: &str) -> String {
    serde_json::json!({
        "v": super::PROTOCOL_VERSION,
        "type": "error",
        "data": { "code": code, "msg": msg }
    })
    .to_string()
}
