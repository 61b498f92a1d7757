use async_trait::async_trait;

use signalhub_core::error::Result;
use signalhub_core::protocol::binary::{BinaryFrame, BinaryOp};

use crate::dispatch::BinaryHandler;
use crate::realtime::{HubCtx, PreparedMsg};

/// Relays binary payloads to a group, or echoes them to the sender.
#[derive(Default)]
pub struct BinaryRelayService;

impl BinaryRelayService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BinaryHandler for BinaryRelayService {
    fn name(&self) -> &'static str {
        "binary_relay"
    }

    fn ops(&self) -> &'static [BinaryOp] {
        &[BinaryOp::Broadcast, BinaryOp::Echo]
    }

    async fn handle_binary(&self, ctx: HubCtx, frame: BinaryFrame) -> Result<()> {
        let exclude_self = frame.exclude_self();
        let msg = PreparedMsg::binary(frame.payload);
        match frame.op {
            BinaryOp::Broadcast => {
                ctx.broadcast(&frame.group, &msg, exclude_self);
            }
            BinaryOp::Echo => {
                ctx.reply(msg)?;
            }
        }
        Ok(())
    }
}
