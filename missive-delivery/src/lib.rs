//! Two-stage mail pipeline
//!
//! Batches of messages are submitted to a bounded prepare queue. The prepare
//! worker persists every message in the content store and queues a send item
//! for it; the send worker reloads each message and hands it to the
//! transport. Every message's outcome is reported to the batch's listener,
//! and a [`MemoryMailListener`] aggregates those reports into an awaitable
//! [`MailStatusResult`].

mod config;
mod error;
mod item;
mod processor;
mod queue;
mod sender;
mod status;
mod transport;

pub use config::DeliveryConfig;
pub use error::{PrepareError, ProducerError, QueueError, SendError, TransportError};
pub use item::{ItemContext, MessageSource, PrepareItem, QueueItem, SendItem};
pub use processor::{ItemHandler, MailWorker, PrepareMailHandler, SendMailHandler};
pub use queue::MailQueueManager;
pub use sender::{MailSender, QueueSizes};
pub use status::{MailListener, MailStatus, MailStatusResult, MemoryMailListener, StatusRegistry};
pub use transport::{SmtpTransport, Transport};
