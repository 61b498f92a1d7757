//! Realtime runtime (connection/session/fan-out engine).

pub mod core;
pub mod types;

pub use core::{
    CloseReason, Connection, ConnectionRegistry, GroupIndex, Hub, HubCtx, Lifecycle,
    OutboundQueue, PushOutcome, SessionState,
};
pub use types::{Delivery, PreparedMsg};
