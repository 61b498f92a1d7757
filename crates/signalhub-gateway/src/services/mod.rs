//! Built-in hub handlers.
//!
//! - `GroupService`: join / leave
//! - `MessagingService`: send / broadcast / broadcast_all
//! - `SysService`: ping
//! - `BinaryRelayService`: binary broadcast / echo

pub mod binary_relay;
pub mod groups;
pub mod messaging;
pub mod sys;

pub use binary_relay::BinaryRelayService;
pub use groups::GroupService;
pub use messaging::MessagingService;
pub use sys::SysService;

use std::sync::Arc;

use crate::dispatch::Dispatcher;

/// Dispatcher with every built-in handler registered.
pub fn default_dispatcher() -> Dispatcher {
    let dispatcher = Dispatcher::new();
    dispatcher.register(Arc::new(GroupService::new()));
    dispatcher.register(Arc::new(MessagingService::new()));
    dispatcher.register(Arc::new(SysService::new()));
    dispatcher.register_binary(Arc::new(BinaryRelayService::new()));
    dispatcher
}
