use async_trait::async_trait;

use signalhub_core::error::{HubError, Result};
use signalhub_core::protocol::text::{Envelope, MessageKind, ServerFrame, ServerKind};

use crate::dispatch::MessageHandler;
use crate::realtime::{HubCtx, PreparedMsg};

#[derive(Default)]
pub struct GroupService;

impl GroupService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for GroupService {
    fn name(&self) -> &'static str {
        "groups"
    }

    fn kinds(&self) -> &'static [MessageKind] {
        &[MessageKind::Join, MessageKind::Leave]
    }

    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let group = env.require_group()?;
        let (changed, ack) = match env.kind {
            MessageKind::Join => (ctx.join(group)?, ServerKind::Joined),
            MessageKind::Leave => (ctx.leave(group)?, ServerKind::Left),
            other => {
                return Err(HubError::BadRequest(format!(
                    "groups cannot handle {}",
                    other.as_str()
                )))
            }
        };
        tracing::debug!(conn_id = %ctx.conn_id(), group, kind = env.kind.as_str(), changed, "membership");

        let frame = ServerFrame::new(ack).group(group).seq(env.seq);
        ctx.reply(PreparedMsg::from_frame(&frame)?)?;
        Ok(())
    }
}
