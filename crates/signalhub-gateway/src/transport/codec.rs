//! Decode-once codec for the transport layer.
//!
//! - Text frames => `Envelope` (lazy `RawValue` for data)
//! - Binary frames => `BinaryFrame` (panic-free `bytes::Buf` parsing)
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;
use signalhub_core::{
    error::Result,
    protocol::{binary, text},
};

#[derive(Debug)]
pub enum Inbound {
    Text(text::Envelope),
    Binary(binary::BinaryFrame),
    Ping,
    Pong,
    Close,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(s) => Ok(Inbound::Text(text::Envelope::parse(&s)?)),
        Message::Binary(b) => Ok(Inbound::Binary(binary::decode_binary_frame(
            bytes::Bytes::from(b),
        )?)),
        Message::Ping(_) => Ok(Inbound::Ping),
        Message::Pong(_) => Ok(Inbound::Pong),
        Message::Close(_) => Ok(Inbound::Close),
    }
}

/// Payload length, computed before decoding so size policy runs first.
pub fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(s) => s.len(),
        Message::Binary(b) => b.len(),
        Message::Ping(v) | Message::Pong(v) => v.len(),
        Message::Close(_) => 0,
    }
}

pub fn is_data_frame(msg: &Message) -> bool {
    matches!(msg, Message::Text(_) | Message::Binary(_))
}
