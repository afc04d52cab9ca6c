//! Entry point tying the queues, workers and status tracking together

use std::{sync::Arc, time::Duration};

use missive_common::{
    BatchId, ContextProvider, ContextStack, ExecutionContext, MailMessage, Session, Signal,
    internal, tracing::error,
};
use missive_store::ContentStore;
use parking_lot::Mutex;
use tokio::{sync::broadcast, task::JoinHandle};

use crate::{
    config::DeliveryConfig,
    error::QueueError,
    item::{ItemContext, MessageSource, PrepareItem, SendItem},
    processor::{MailWorker, PrepareMailHandler, SendMailHandler},
    queue::MailQueueManager,
    status::{MailListener, MailStatusResult, MemoryMailListener, StatusRegistry},
    transport::Transport,
};

/// Number of items waiting in each queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSizes {
    pub prepare: usize,
    pub send: usize,
}

/// A running pipeline: one prepare worker and one send worker, each on its
/// own task, connected by the send queue.
#[derive(Debug)]
pub struct MailSender {
    config: DeliveryConfig,
    registry: StatusRegistry,
    prepare: Arc<MailWorker<PrepareMailHandler>>,
    send: Arc<MailWorker<SendMailHandler>>,
    shutdown: broadcast::Sender<Signal>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MailSender {
    /// Spawn both workers on the current Tokio runtime
    pub fn start(
        config: DeliveryConfig,
        store: Arc<dyn ContentStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::start_with_contexts(
            config,
            store,
            transport,
            Arc::new(ContextStack::new()),
            Arc::new(ContextStack::new()),
        )
    }

    /// Like [`start`](Self::start), activating item contexts on the given
    /// providers, one per worker.
    ///
    /// Collaborators that need the caller's context (a store keyed by wiki,
    /// for instance) read it from the same provider.
    pub fn start_with_contexts(
        config: DeliveryConfig,
        store: Arc<dyn ContentStore>,
        transport: Arc<dyn Transport>,
        prepare_contexts: Arc<dyn ContextProvider>,
        send_contexts: Arc<dyn ContextProvider>,
    ) -> Self {
        internal!("Initialising mail sender ...");

        let registry = StatusRegistry::with_retention(config.status_retention());
        let prepare_queue = Arc::new(MailQueueManager::new(
            config.prepare_queue_capacity,
            registry.clone(),
        ));
        let send_queue = Arc::new(MailQueueManager::new(
            config.send_queue_capacity,
            registry.clone(),
        ));

        let prepare = Arc::new(MailWorker::new(
            prepare_queue,
            PrepareMailHandler::new(Arc::clone(&store), Arc::clone(&send_queue), prepare_contexts),
        ));
        let send = Arc::new(MailWorker::new(
            send_queue,
            SendMailHandler::new(store, transport, send_contexts, config.delete_on_success),
        ));

        let (shutdown, _) = broadcast::channel(1);
        let handles = vec![
            {
                let worker = Arc::clone(&prepare);
                let signal = shutdown.subscribe();
                tokio::spawn(async move { worker.serve(signal).await })
            },
            {
                let worker = Arc::clone(&send);
                let signal = shutdown.subscribe();
                tokio::spawn(async move { worker.serve(signal).await })
            },
        ];

        Self {
            config,
            registry,
            prepare,
            send,
            shutdown,
            handles: Mutex::new(handles),
        }
    }

    /// Submit a batch for preparation and sending.
    ///
    /// Waits at most the configured enqueue timeout for room in the prepare
    /// queue. On success the batch is being processed in the background; if
    /// the listener keeps a status result, the batch can be awaited by the
    /// returned id.
    ///
    /// # Errors
    /// [`QueueError::QueueFullTimeout`] if the prepare queue stays full. The
    /// batch is not submitted in that case.
    pub async fn send_asynchronously(
        &self,
        messages: MessageSource,
        session: Arc<Session>,
        listener: Option<Arc<dyn MailListener>>,
        context: ExecutionContext,
    ) -> Result<BatchId, QueueError> {
        let batch_id = BatchId::generate();
        let item = PrepareItem::new(
            ItemContext {
                batch_id: batch_id.clone(),
                session,
                listener,
                context,
            },
            messages,
        );

        self.prepare
            .queue()
            .add_message(item, self.config.enqueue_timeout())
            .await?;

        internal!(level = DEBUG, "Submitted batch {batch_id}");
        Ok(batch_id)
    }

    /// Submit already built messages, tracking them with a
    /// [`MemoryMailListener`].
    ///
    /// # Errors
    /// See [`send_asynchronously`](Self::send_asynchronously)
    pub async fn send_messages(
        &self,
        messages: Vec<MailMessage>,
        session: Arc<Session>,
        context: ExecutionContext,
    ) -> Result<(BatchId, Arc<MailStatusResult>), QueueError> {
        let listener = MemoryMailListener::new();
        let result = listener.result();
        let batch_id = self
            .send_asynchronously(
                Box::new(messages.into_iter().map(Ok)),
                session,
                Some(Arc::new(listener)),
                context,
            )
            .await?;

        Ok((batch_id, result))
    }

    /// Wait until every message of the batch has reached a terminal state
    ///
    /// Processed batches are only tracked for the configured retention, after
    /// which they count as unknown.
    ///
    /// # Errors
    /// - [`QueueError::UnknownBatch`] if the batch is not tracked
    /// - [`QueueError::ProcessingTimeout`] if the timeout elapses first
    pub async fn wait_till_processed(
        &self,
        batch_id: &BatchId,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.prepare
            .queue()
            .wait_till_processed(batch_id, timeout)
            .await
    }

    pub fn status(&self, batch_id: &BatchId) -> Option<Arc<MailStatusResult>> {
        self.registry.get(batch_id)
    }

    /// Stop tracking a batch, returning its final status
    pub fn forget(&self, batch_id: &BatchId) -> Option<Arc<MailStatusResult>> {
        self.registry.remove(batch_id)
    }

    pub fn queue_sizes(&self) -> QueueSizes {
        QueueSizes {
            prepare: self.prepare.queue().len(),
            send: self.send.queue().len(),
        }
    }

    pub fn prepare_queue(&self) -> &Arc<MailQueueManager<PrepareItem>> {
        self.prepare.queue()
    }

    /// The queue between the two workers
    pub fn send_queue(&self) -> &Arc<MailQueueManager<SendItem>> {
        self.send.queue()
    }

    /// Make both workers stop after their current item.
    ///
    /// Items still queued stay queued and are not processed.
    pub fn stop_processing(&self) {
        internal!(level = INFO, "Stopping mail processing");
        self.prepare.stop_processing();
        self.send.stop_processing();
    }

    pub fn is_stopped(&self) -> bool {
        self.prepare.is_stopped() && self.send.is_stopped()
    }

    /// Signal both workers to stop and wait for their tasks to end
    pub async fn shutdown(&self) {
        // No receivers left means both workers already ended
        let _ = self.shutdown.send(Signal::Shutdown);

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Mail worker task failed: {e}");
            }
        }

        internal!(level = INFO, "Mail sender shut down");
    }
}
