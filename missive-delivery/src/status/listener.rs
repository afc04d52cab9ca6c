use std::sync::Arc;

use missive_common::{BatchId, ErrorSummary, MailState, MessageId, tracing::debug};

use crate::{
    error::{PrepareError, ProducerError, SendError},
    status::MailStatusResult,
};

/// Receiver of the lifecycle events of a batch.
///
/// Every callback is optional. A listener belongs to one batch: the workers
/// call it from their own tasks, so implementations must be cheap and must
/// not block.
pub trait MailListener: Send + Sync + std::fmt::Debug {
    fn on_prepare_begin(&self, _batch_id: &BatchId) {}

    /// The message was persisted and handed to the send queue
    fn on_prepare_message_success(&self, _batch_id: &BatchId, _message_id: MessageId) {}

    /// The message could not be persisted and will not be sent
    fn on_prepare_message_error(
        &self,
        _batch_id: &BatchId,
        _message_id: MessageId,
        _error: &PrepareError,
    ) {
    }

    /// The message source failed; no further messages of the batch follow
    fn on_prepare_fatal_error(&self, _batch_id: &BatchId, _error: &ProducerError) {}

    /// Preparation is over; the number of messages in the batch is final
    fn on_prepare_end(&self, _batch_id: &BatchId) {}

    fn on_send_message_success(&self, _batch_id: &BatchId, _message_id: MessageId) {}

    fn on_send_message_error(&self, _batch_id: &BatchId, _message_id: MessageId, _error: &SendError) {
    }

    /// The aggregated status this listener maintains, if any.
    ///
    /// Queues register it so the batch can be awaited and queried by id.
    fn status_result(&self) -> Option<Arc<MailStatusResult>> {
        None
    }
}

/// Listener that records every event into a [`MailStatusResult`]
#[derive(Debug, Default, Clone)]
pub struct MemoryMailListener {
    result: Arc<MailStatusResult>,
}

impl MemoryMailListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn result(&self) -> Arc<MailStatusResult> {
        Arc::clone(&self.result)
    }
}

impl MailListener for MemoryMailListener {
    fn on_prepare_begin(&self, batch_id: &BatchId) {
        debug!(batch_id = %batch_id, "Preparing batch");
    }

    fn on_prepare_message_success(&self, batch_id: &BatchId, message_id: MessageId) {
        self.result
            .record_prepared(batch_id, message_id, MailState::PrepareSuccess, None);
    }

    fn on_prepare_message_error(
        &self,
        batch_id: &BatchId,
        message_id: MessageId,
        error: &PrepareError,
    ) {
        self.result.record_prepared(
            batch_id,
            message_id,
            MailState::PrepareError,
            Some(error.summary()),
        );
    }

    fn on_prepare_fatal_error(&self, _batch_id: &BatchId, error: &ProducerError) {
        self.result.record_fatal_error(error.summary());
    }

    fn on_prepare_end(&self, batch_id: &BatchId) {
        self.result.finish_preparation();
        debug!(
            batch_id = %batch_id,
            messages = self.result.expected_count(),
            "Finished preparing batch"
        );
    }

    fn on_send_message_success(&self, batch_id: &BatchId, message_id: MessageId) {
        self.result.record(batch_id, message_id, MailState::Sent, None);
    }

    fn on_send_message_error(&self, batch_id: &BatchId, message_id: MessageId, error: &SendError) {
        self.result
            .record(batch_id, message_id, MailState::Failed, Some(error.summary()));
    }

    fn status_result(&self) -> Option<Arc<MailStatusResult>> {
        Some(self.result())
    }
}
