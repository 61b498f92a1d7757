//! Policy layer (frame size limit, per-connection rate limiting).
//!
//! Applied to every inbound frame before it is decoded.

pub mod engine;

pub use engine::{ConnRateLimiter, PolicyDecision, PolicyEngine};
