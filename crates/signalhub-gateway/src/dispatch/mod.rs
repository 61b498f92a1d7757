//! Dispatcher module exports.
//!
//! Inbound messages carry an explicit tag (`MessageKind` / `BinaryOp`); the
//! dispatcher resolves it through a handler table instead of by method name.

pub mod dispatcher;

pub use dispatcher::{BinaryHandler, Dispatcher, MessageHandler};
