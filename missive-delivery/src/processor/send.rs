//! Send stage: reload a prepared message and hand it to the transport

use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures_util::FutureExt;
use missive_common::{
    ContextProvider, ContextScope, ExecutionContext, MessageId,
    tracing::{debug, warn},
};
use missive_store::ContentStore;

use crate::{
    error::SendError,
    item::{ItemContext, SendItem},
    processor::{ItemHandler, panic_message},
    transport::Transport,
};

#[derive(Debug)]
pub struct SendMailHandler {
    store: Arc<dyn ContentStore>,
    transport: Arc<dyn Transport>,
    contexts: Arc<dyn ContextProvider>,
    delete_on_success: bool,
}

impl SendMailHandler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        transport: Arc<dyn Transport>,
        contexts: Arc<dyn ContextProvider>,
        delete_on_success: bool,
    ) -> Self {
        Self {
            store,
            transport,
            contexts,
            delete_on_success,
        }
    }

    async fn deliver(&self, ctx: &ItemContext, message_id: &MessageId) -> Result<(), SendError> {
        let message = self
            .store
            .load(&ctx.session, &ctx.batch_id, message_id)
            .await?;
        self.transport.send(&message, &ctx.session).await?;
        Ok(())
    }
}

#[async_trait]
impl ItemHandler for SendMailHandler {
    type Item = SendItem;
    const NAME: &'static str = "Send";

    async fn handle(&self, item: SendItem) {
        let SendItem {
            ctx,
            message_id,
            wiki_id,
        } = item;

        let _scope = ContextScope::enter(
            &self.contexts,
            ExecutionContext {
                wiki_id,
                ..ctx.context.clone()
            },
        );

        let outcome = match AssertUnwindSafe(self.deliver(&ctx, &message_id))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Err(SendError::Panicked(panic_message(&*panic))),
        };

        match outcome {
            Ok(()) => {
                debug!(
                    batch_id = %ctx.batch_id,
                    message_id = %message_id,
                    "Message sent"
                );

                if self.delete_on_success
                    && let Err(error) = self.store.delete(&ctx.batch_id, &message_id).await
                {
                    warn!(
                        batch_id = %ctx.batch_id,
                        message_id = %message_id,
                        error = %error,
                        "Failed to delete sent message from the content store"
                    );
                }

                if let Some(listener) = &ctx.listener {
                    listener.on_send_message_success(&ctx.batch_id, message_id);
                }
            }
            Err(error) => {
                warn!(
                    batch_id = %ctx.batch_id,
                    message_id = %message_id,
                    error = %error,
                    "Failed to send message"
                );

                if let Some(listener) = &ctx.listener {
                    listener.on_send_message_error(&ctx.batch_id, message_id, &error);
                }
            }
        }
    }
}
