//! Typed errors for the pipeline.
//!
//! Only [`QueueError`] ever reaches a caller. Everything else is recorded
//! against the message it concerns and rendered with
//! [`ErrorSummary::summary`] into the batch status.

use std::time::Duration;

use missive_common::{BatchId, ErrorSummary};
use missive_store::StoreError;
use thiserror::Error;

/// Errors surfaced synchronously by the queues.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A bounded insert could not complete before its deadline.
    #[error("Queue full: could not enqueue {item} within {waited:?}")]
    QueueFullTimeout { item: String, waited: Duration },

    /// A batch did not finish processing before the deadline.
    #[error("Batch {batch_id} was not processed within {waited:?}")]
    ProcessingTimeout { batch_id: BatchId, waited: Duration },

    /// Nothing tracks the status of this batch.
    #[error("No status is tracked for batch {0}")]
    UnknownBatch(BatchId),

    /// The consuming side of the queue is gone.
    #[error("Queue is closed")]
    Closed,
}

impl QueueError {
    /// Returns `true` if this error is one of the deadline variants.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::QueueFullTimeout { .. } | Self::ProcessingTimeout { .. }
        )
    }
}

impl ErrorSummary for QueueError {
    fn kind(&self) -> &'static str {
        match self {
            Self::QueueFullTimeout { .. } => "QueueError::QueueFullTimeout",
            Self::ProcessingTimeout { .. } => "QueueError::ProcessingTimeout",
            Self::UnknownBatch(_) => "QueueError::UnknownBatch",
            Self::Closed => "QueueError::Closed",
        }
    }
}

/// Persisting one message failed.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Failed to store message: {0}")]
    Store(#[from] StoreError),

    #[error("Content store panicked: {0}")]
    Panicked(String),
}

impl ErrorSummary for PrepareError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Store(inner) => inner.kind(),
            Self::Panicked(_) => "PrepareError::Panicked",
        }
    }
}

/// The message source of a prepare item failed to yield a message.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("Message source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Message source panicked: {0}")]
    Panicked(String),
}

impl ProducerError {
    /// Wrap any error raised while producing a message.
    pub fn new(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Source(error.into())
    }
}

impl ErrorSummary for ProducerError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Source(_) => "ProducerError::Source",
            Self::Panicked(_) => "ProducerError::Panicked",
        }
    }
}

/// Transmitting one message failed.
#[derive(Debug, Error)]
pub enum SendError {
    /// The prepared message could not be reloaded.
    #[error("Failed to load message: {0}")]
    Load(#[from] StoreError),

    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Send stage panicked: {0}")]
    Panicked(String),
}

impl ErrorSummary for SendError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Load(inner) => inner.kind(),
            Self::Transport(inner) => inner.kind(),
            Self::Panicked(_) => "SendError::Panicked",
        }
    }
}

/// Failures reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// A sender or recipient address could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The session could not be turned into a transport.
    #[error("Invalid transport configuration: {0}")]
    Build(String),

    /// The server could not be reached or the connection broke.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The server refused the message.
    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Internal transport error: {0}")]
    Internal(String),
}

impl ErrorSummary for TransportError {
    fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "TransportError::InvalidAddress",
            Self::Build(_) => "TransportError::Build",
            Self::Connection(_) => "TransportError::Connection",
            Self::Rejected(_) => "TransportError::Rejected",
            Self::Internal(_) => "TransportError::Internal",
        }
    }
}
