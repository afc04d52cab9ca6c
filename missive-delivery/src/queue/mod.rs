//! Bounded FIFO queues feeding the workers

use std::time::Duration;

use missive_common::{BatchId, tracing::warn};
use tokio::sync::{Mutex, mpsc};

use crate::{error::QueueError, item::QueueItem, status::StatusRegistry};

/// Capacity-bounded FIFO of queue items, one per stage.
///
/// Any number of producers may insert concurrently; one or more workers take
/// items with [`next_item`](Self::next_item). Items are handed out in
/// insertion order.
#[derive(Debug)]
pub struct MailQueueManager<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<mpsc::Receiver<T>>,
    registry: StatusRegistry,
}

impl<T: QueueItem> MailQueueManager<T> {
    /// Create a queue holding at most `capacity` items (at least one).
    ///
    /// Batches whose listener exposes a status result are registered in
    /// `registry` when their items are enqueued.
    #[must_use]
    pub fn new(capacity: usize, registry: StatusRegistry) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            registry,
        }
    }

    fn register(&self, item: &T) {
        if let Some(result) = item.listener().and_then(|listener| listener.status_result()) {
            self.registry.register(item.batch_id().clone(), result);
        }
    }

    /// Insert an item, waiting for as long as the queue is full.
    ///
    /// Used between workers, where dropping work is never acceptable.
    pub async fn add_to_queue(&self, item: T) {
        self.register(&item);

        if let Err(mpsc::error::SendError(item)) = self.sender.send(item).await {
            warn!(
                batch_id = %item.batch_id(),
                "Queue closed, dropping {}",
                item.description()
            );
        }
    }

    /// Insert an item, waiting at most `timeout` for room.
    ///
    /// # Errors
    /// [`QueueError::QueueFullTimeout`] if the queue is still full when the
    /// timeout elapses. Nothing is enqueued or registered in that case.
    pub async fn add_message(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        let description = item.description();
        let batch_id = item.batch_id().clone();
        let result = item.listener().and_then(|listener| listener.status_result());

        match self.sender.send_timeout(item, timeout).await {
            Ok(()) => {
                if let Some(result) = result {
                    self.registry.register(batch_id, result);
                }
                Ok(())
            }
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => Err(QueueError::QueueFullTimeout {
                item: description,
                waited: timeout,
            }),
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Wait for the next item. `None` once the queue is closed and drained.
    pub async fn next_item(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Wait until the named batch is fully processed.
    ///
    /// # Errors
    /// - [`QueueError::UnknownBatch`] if no status result is tracked for it
    /// - [`QueueError::ProcessingTimeout`] if the timeout elapses first
    pub async fn wait_till_processed(
        &self,
        batch_id: &BatchId,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        let result = self
            .registry
            .get(batch_id)
            .ok_or_else(|| QueueError::UnknownBatch(batch_id.clone()))?;

        if result.wait_till_processed(timeout).await {
            Ok(())
        } else {
            Err(QueueError::ProcessingTimeout {
                batch_id: batch_id.clone(),
                waited: timeout,
            })
        }
    }

    /// Number of items currently waiting
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}
