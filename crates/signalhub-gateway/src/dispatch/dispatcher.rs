use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use signalhub_core::error::{HubError, Result};
use signalhub_core::protocol::binary::{BinaryFrame, BinaryOp};
use signalhub_core::protocol::text::{Envelope, MessageKind};

use crate::realtime::HubCtx;

/// Text-lane handler. One handler may serve several message kinds.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn kinds(&self) -> &'static [MessageKind];
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()>;
}

/// Binary-lane handler.
#[async_trait]
pub trait BinaryHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn ops(&self) -> &'static [BinaryOp];
    async fn handle_binary(&self, ctx: HubCtx, frame: BinaryFrame) -> Result<()>;
}

/// Handler lookup tables keyed by message tag.
#[derive(Default)]
pub struct Dispatcher {
    text: DashMap<MessageKind, Arc<dyn MessageHandler>>,
    binary: DashMap<BinaryOp, Arc<dyn BinaryHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            text: DashMap::new(),
            binary: DashMap::new(),
        }
    }

    /// Register `handler` for every kind it declares. Later registrations win.
    pub fn register(&self, handler: Arc<dyn MessageHandler>) {
        for kind in handler.kinds() {
            if let Some(prev) = self.text.insert(*kind, Arc::clone(&handler)) {
                tracing::warn!(kind = kind.as_str(), replaced = prev.name(), by = handler.name(), "handler replaced");
            }
        }
    }

    pub fn register_binary(&self, handler: Arc<dyn BinaryHandler>) {
        for op in handler.ops() {
            if let Some(prev) = self.binary.insert(*op, Arc::clone(&handler)) {
                tracing::warn!(op = op.as_str(), replaced = prev.name(), by = handler.name(), "binary handler replaced");
            }
        }
    }

    pub fn registered_kinds(&self) -> Vec<MessageKind> {
        self.text.iter().map(|e| *e.key()).collect()
    }

    pub fn registered_ops(&self) -> Vec<BinaryOp> {
        self.binary.iter().map(|e| *e.key()).collect()
    }

    pub async fn dispatch(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let kind = env.kind;
        // Clone out of the map so no shard lock is held across the await.
        let handler = self
            .text
            .get(&kind)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| HubError::BadRequest(format!("no handler for {}", kind.as_str())))?;
        handler.handle(ctx, env).await
    }

    pub async fn dispatch_binary(&self, ctx: HubCtx, frame: BinaryFrame) -> Result<()> {
        let op = frame.op;
        let handler = self
            .binary
            .get(&op)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| HubError::BadRequest(format!("no handler for binary op {}", op.as_str())))?;
        handler.handle_binary(ctx, frame).await
    }
}
