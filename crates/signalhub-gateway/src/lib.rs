//! signalhub gateway library entry.
//!
//! Wires the transport, policy, dispatcher, realtime hub, and built-in
//! handlers into a server stack. Consumed by the binary (`main.rs`) and by
//! integration tests.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod realtime;
pub mod router;
pub mod services;
pub mod transport;
