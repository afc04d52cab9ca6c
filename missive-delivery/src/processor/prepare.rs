//! Prepare stage: persist each message of a batch and queue it for sending

use std::{panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures_util::FutureExt;
use missive_common::{
    ContextProvider, ContextScope, MailMessage, MessageId,
    tracing::{debug, warn},
};
use missive_store::ContentStore;

use crate::{
    error::{PrepareError, ProducerError},
    item::{ItemContext, PrepareItem, SendItem},
    processor::{ItemHandler, panic_message},
    queue::MailQueueManager,
};

/// Turns a [`PrepareItem`] into persisted messages and [`SendItem`]s.
///
/// A message that fails to persist is reported and skipped. A failing message
/// source ends the batch early; everything yielded before the failure is
/// still prepared.
#[derive(Debug)]
pub struct PrepareMailHandler {
    store: Arc<dyn ContentStore>,
    send_queue: Arc<MailQueueManager<SendItem>>,
    contexts: Arc<dyn ContextProvider>,
}

impl PrepareMailHandler {
    pub fn new(
        store: Arc<dyn ContentStore>,
        send_queue: Arc<MailQueueManager<SendItem>>,
        contexts: Arc<dyn ContextProvider>,
    ) -> Self {
        Self {
            store,
            send_queue,
            contexts,
        }
    }

    async fn prepare_message(&self, ctx: &ItemContext, message: MailMessage) {
        let saved = match AssertUnwindSafe(self.store.save(&ctx.batch_id, &message))
            .catch_unwind()
            .await
        {
            Ok(saved) => saved.map_err(PrepareError::from),
            Err(panic) => Err(PrepareError::Panicked(panic_message(&*panic))),
        };

        match saved {
            Ok(message_id) => {
                debug!(
                    batch_id = %ctx.batch_id,
                    message_id = %message_id,
                    "Message prepared"
                );

                if let Some(listener) = &ctx.listener {
                    listener.on_prepare_message_success(&ctx.batch_id, message_id);
                }

                self.send_queue
                    .add_to_queue(SendItem {
                        ctx: ctx.clone(),
                        message_id,
                        wiki_id: ctx.context.wiki_id.clone(),
                    })
                    .await;
            }
            Err(error) => {
                // Nothing was stored, so the failure is tracked under a key of its own
                let message_id = MessageId::generate();
                warn!(
                    batch_id = %ctx.batch_id,
                    message_id = %message_id,
                    mail_id = %message.id(),
                    error = %error,
                    "Failed to prepare message"
                );

                if let Some(listener) = &ctx.listener {
                    listener.on_prepare_message_error(&ctx.batch_id, message_id, &error);
                }
            }
        }
    }
}

#[async_trait]
impl ItemHandler for PrepareMailHandler {
    type Item = PrepareItem;
    const NAME: &'static str = "Prepare";

    async fn handle(&self, item: PrepareItem) {
        let PrepareItem { ctx, mut messages } = item;
        let _scope = ContextScope::enter(&self.contexts, ctx.context.clone());

        if let Some(listener) = &ctx.listener {
            listener.on_prepare_begin(&ctx.batch_id);
        }

        loop {
            let next = std::panic::catch_unwind(AssertUnwindSafe(|| messages.next()))
                .unwrap_or_else(|panic| Some(Err(ProducerError::Panicked(panic_message(&*panic)))));

            let message = match next {
                None => break,
                Some(Ok(message)) => message,
                Some(Err(error)) => {
                    warn!(
                        batch_id = %ctx.batch_id,
                        error = %error,
                        "Message source failed, abandoning the rest of the batch"
                    );

                    if let Some(listener) = &ctx.listener {
                        listener.on_prepare_fatal_error(&ctx.batch_id, &error);
                    }
                    break;
                }
            };

            self.prepare_message(&ctx, message).await;
        }

        if let Some(listener) = &ctx.listener {
            listener.on_prepare_end(&ctx.batch_id);
        }
    }
}
