use async_trait::async_trait;

use signalhub_core::error::Result;
use signalhub_core::protocol::text::{Envelope, MessageKind, ServerFrame, ServerKind};

use crate::dispatch::MessageHandler;
use crate::realtime::{HubCtx, PreparedMsg};

/// Application-level ping; answers with `pong` echoing `seq`.
#[derive(Default)]
pub struct SysService;

impl SysService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for SysService {
    fn name(&self) -> &'static str {
        "sys"
    }

    fn kinds(&self) -> &'static [MessageKind] {
        &[MessageKind::Ping]
    }

    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let frame = ServerFrame::new(ServerKind::Pong).seq(env.seq);
        ctx.reply(PreparedMsg::from_frame(&frame)?)?;
        Ok(())
    }
}
