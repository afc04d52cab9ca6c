//! Worker loops for the prepare and send stages

pub mod prepare;
pub mod send;

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use futures_util::FutureExt;
use missive_common::{Signal, internal, tracing::error};
use tokio::sync::{Notify, broadcast};

use crate::{item::QueueItem, queue::MailQueueManager};

pub use prepare::PrepareMailHandler;
pub use send::SendMailHandler;

/// Per-item algorithm of one stage.
///
/// Handlers record failures through the item's listener; they never return
/// them to the worker.
#[async_trait]
pub trait ItemHandler: Send + Sync + 'static {
    type Item: QueueItem;

    /// Name of the stage, used in logs
    const NAME: &'static str;

    async fn handle(&self, item: Self::Item);
}

/// Render a panic payload for logs and status summaries
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Consume loop of one stage.
///
/// Takes items from its queue one at a time and hands each to the handler
/// inside a panic boundary, so no single item can end the loop. The loop ends
/// on [`Signal::Shutdown`], when the queue closes, or after
/// [`stop_processing`](Self::stop_processing).
pub struct MailWorker<H: ItemHandler> {
    queue: Arc<MailQueueManager<H::Item>>,
    handler: H,
    stopped: AtomicBool,
    stop: Notify,
}

impl<H: ItemHandler> std::fmt::Debug for MailWorker<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailWorker")
            .field("stage", &H::NAME)
            .field("queued", &self.queue.len())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl<H: ItemHandler> MailWorker<H> {
    pub fn new(queue: Arc<MailQueueManager<H::Item>>, handler: H) -> Self {
        Self {
            queue,
            handler,
            stopped: AtomicBool::new(false),
            stop: Notify::new(),
        }
    }

    pub const fn queue(&self) -> &Arc<MailQueueManager<H::Item>> {
        &self.queue
    }

    /// Ask the loop to end.
    ///
    /// An item already being processed is finished first; a pending wait for
    /// the next item is interrupted. Recorded statuses are kept.
    pub fn stop_processing(&self) {
        self.stopped.store(true, Ordering::Release);
        self.stop.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Run the consume loop until stopped
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) {
        internal!(level = INFO, "{} worker starting", H::NAME);

        while !self.is_stopped() {
            // Stop requests win over queued items
            let item = tokio::select! {
                biased;

                () = self.stop.notified() => continue,
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) => {
                            internal!("{} worker received shutdown signal", H::NAME);
                        }
                        Err(e) => {
                            error!("{} worker shutdown channel error: {e}", H::NAME);
                        }
                    }
                    break;
                }
                item = self.queue.next_item() => item,
            };

            let Some(item) = item else {
                internal!("{} queue closed", H::NAME);
                break;
            };

            self.process(item).await;
        }

        internal!(level = INFO, "{} worker stopped", H::NAME);
    }

    async fn process(&self, item: H::Item) {
        let batch_id = item.batch_id().clone();
        let description = item.description();

        if let Err(panic) = AssertUnwindSafe(self.handler.handle(item))
            .catch_unwind()
            .await
        {
            error!(
                batch_id = %batch_id,
                panic = %panic_message(&*panic),
                "{} worker panicked while processing {description}",
                H::NAME
            );
        }
    }
}
