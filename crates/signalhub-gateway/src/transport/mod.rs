//! Transport layer (WebSocket).
//!
//! Exposes the upgrade handler, the per-connection session loop, and the
//! codec that decodes frames once before they reach the dispatcher.

pub mod codec;
pub mod ws;
