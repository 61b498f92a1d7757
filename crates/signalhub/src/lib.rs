//! Top-level facade crate for signalhub.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use signalhub_core::*;
}

pub mod gateway {
    pub use signalhub_gateway::*;
}
