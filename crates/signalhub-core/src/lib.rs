//! signalhub core: transport-agnostic protocol primitives and the error surface.
//!
//! This crate defines the wire-level contracts shared by the gateway and by
//! client tooling. It carries no transport or runtime dependencies so it can
//! be reused by test harnesses and SDKs.
//!
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `HubError`/`Result` so malformed client traffic never takes the
//! process down.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ClientCode, HubError, Result};
