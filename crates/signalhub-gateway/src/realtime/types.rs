use std::sync::Arc;

use axum::extract::ws::Message;
use bytes::Bytes;

use signalhub_core::error::Result;
use signalhub_core::protocol::text::ServerFrame;

/// Frame prepared once and shared by every recipient of a fan-out.
#[derive(Debug, Clone)]
pub enum PreparedMsg {
    Text(Arc<str>),
    Binary(Bytes),
}

impl PreparedMsg {
    pub fn from_frame(frame: &ServerFrame<'_>) -> Result<Self> {
        Ok(PreparedMsg::Text(Arc::from(frame.to_json()?)))
    }

    pub fn text(s: impl Into<Arc<str>>) -> Self {
        PreparedMsg::Text(s.into())
    }

    pub fn binary(b: Bytes) -> Self {
        PreparedMsg::Binary(b)
    }

    /// Convert to axum::ws::Message for transport.
    /// NOTE: axum's Message owns its buffer, so each recipient gets its own copy here.
    pub fn to_ws_message(&self) -> Message {
        match self {
            PreparedMsg::Text(s) => Message::Text(s.to_string()),
            PreparedMsg::Binary(b) => Message::Binary(b.to_vec()),
        }
    }
}

/// Per-fan-out delivery report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Frames enqueued (including those that evicted an older frame).
    pub delivered: usize,
    /// Recipients whose queue overflowed or was already closed.
    pub dropped: usize,
    /// Recipients skipped: sender excluded, not yet connected, or already gone.
    pub skipped: usize,
}

impl Delivery {
    pub fn merge(&mut self, other: Delivery) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.skipped += other.skipped;
    }
}
