use async_trait::async_trait;

use signalhub_core::error::{HubError, Result};
use signalhub_core::protocol::text::{Envelope, MessageKind, ServerFrame, ServerKind};

use crate::dispatch::MessageHandler;
use crate::realtime::{HubCtx, PreparedMsg};

/// Relays `data` untouched, stamped with the sender's connection id.
#[derive(Default)]
pub struct MessagingService;

impl MessagingService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for MessagingService {
    fn name(&self) -> &'static str {
        "messaging"
    }

    fn kinds(&self) -> &'static [MessageKind] {
        &[MessageKind::Send, MessageKind::Broadcast, MessageKind::BroadcastAll]
    }

    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        match env.kind {
            MessageKind::Send => {
                let to = env.require_to()?;
                let frame = ServerFrame::new(ServerKind::Message)
                    .sender(ctx.conn_id())
                    .data(env.data());
                match ctx.send(to, PreparedMsg::from_frame(&frame)?) {
                    Ok(outcome) => {
                        tracing::trace!(from = %ctx.conn_id(), to, outcome = outcome.as_str(), "send");
                        Ok(())
                    }
                    Err(e) if e.is_benign() => {
                        tracing::debug!(from = %ctx.conn_id(), to, "send to unknown connection ignored");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            MessageKind::Broadcast => {
                let group = env.require_group()?;
                let frame = ServerFrame::new(ServerKind::Message)
                    .sender(ctx.conn_id())
                    .group(group)
                    .data(env.data());
                let msg = PreparedMsg::from_frame(&frame)?;
                let report = ctx.broadcast(group, &msg, env.exclude_self);
                if report == Default::default() {
                    tracing::debug!(from = %ctx.conn_id(), group, "broadcast to unknown or empty group");
                }
                Ok(())
            }
            MessageKind::BroadcastAll => {
                let frame = ServerFrame::new(ServerKind::Message)
                    .sender(ctx.conn_id())
                    .data(env.data());
                let msg = PreparedMsg::from_frame(&frame)?;
                let report = ctx.broadcast_all(&msg, env.exclude_self);
                tracing::trace!(from = %ctx.conn_id(), ?report, "broadcast_all");
                Ok(())
            }
            other => Err(HubError::BadRequest(format!(
                "messaging cannot handle {}",
                other.as_str()
            ))),
        }
    }
}
