//! Realtime core components.
//!
//! Connection registry, group index, per-connection outbound queues and
//! lifecycle, and the hub that ties them together for fan-out.

mod groups;
mod hub;
mod lifecycle;
mod outbound;
mod registry;

pub use groups::GroupIndex;
pub use hub::{Hub, HubCtx};
pub use lifecycle::{CloseReason, Lifecycle, SessionState};
pub use outbound::{OutboundQueue, PushOutcome};
pub use registry::{Connection, ConnectionRegistry};
