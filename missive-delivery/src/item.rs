//! Units of work travelling through the two queues

use std::{fmt, sync::Arc};

use missive_common::{BatchId, ExecutionContext, MailMessage, MessageId, Session};

use crate::{error::ProducerError, status::MailListener};

/// One-shot, lazily evaluated sequence of messages.
///
/// Producing a message may fail independently of persisting it.
pub type MessageSource = Box<dyn Iterator<Item = Result<MailMessage, ProducerError>> + Send>;

/// State shared by every item of a batch
#[derive(Clone)]
pub struct ItemContext {
    pub batch_id: BatchId,
    pub session: Arc<Session>,
    /// Without a listener, status events are dropped
    pub listener: Option<Arc<dyn MailListener>>,
    /// Caller state to activate while the item is processed
    pub context: ExecutionContext,
}

impl fmt::Debug for ItemContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemContext")
            .field("batch_id", &self.batch_id)
            .field("session", &self.session.address())
            .field("listener", &self.listener.is_some())
            .field("context", &self.context)
            .finish()
    }
}

/// Behaviour common to prepare and send items
pub trait QueueItem: Send + 'static {
    fn context(&self) -> &ItemContext;

    /// Human readable description, used in queue errors and logs
    fn description(&self) -> String;

    fn batch_id(&self) -> &BatchId {
        &self.context().batch_id
    }

    fn listener(&self) -> Option<&Arc<dyn MailListener>> {
        self.context().listener.as_ref()
    }
}

/// A batch waiting to be persisted
pub struct PrepareItem {
    pub ctx: ItemContext,
    pub messages: MessageSource,
}

impl PrepareItem {
    pub fn new(ctx: ItemContext, messages: MessageSource) -> Self {
        Self { ctx, messages }
    }

    /// Convenience for sources that cannot fail
    pub fn from_messages(ctx: ItemContext, messages: Vec<MailMessage>) -> Self {
        Self::new(ctx, Box::new(messages.into_iter().map(Ok)))
    }
}

impl fmt::Debug for PrepareItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareItem")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl QueueItem for PrepareItem {
    fn context(&self) -> &ItemContext {
        &self.ctx
    }

    fn description(&self) -> String {
        format!("prepare item for batch {}", self.ctx.batch_id)
    }
}

/// A persisted message waiting to be transmitted
#[derive(Debug, Clone)]
pub struct SendItem {
    pub ctx: ItemContext,
    pub message_id: MessageId,
    /// Tenant the message belongs to
    pub wiki_id: String,
}

impl QueueItem for SendItem {
    fn context(&self) -> &ItemContext {
        &self.ctx
    }

    fn description(&self) -> String {
        format!(
            "send item for message {} of batch {} (wiki {})",
            self.message_id, self.ctx.batch_id, self.wiki_id
        )
    }
}
