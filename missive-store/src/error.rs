//! Error types for the missive-store crate.

use std::io;

use missive_common::{BatchId, ErrorSummary, MessageId};
use thiserror::Error;

/// Top-level content store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (file read/write/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Message not found: {batch_id}/{message_id}")]
    NotFound {
        batch_id: BatchId,
        message_id: MessageId,
    },

    #[error("Message already exists: {batch_id}/{message_id}")]
    AlreadyExists {
        batch_id: BatchId,
        message_id: MessageId,
    },

    #[error("Store capacity exceeded: {len}/{capacity} messages")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Store directory validation failed.
    #[error("Store validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns `true` if the requested message does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl ErrorSummary for StoreError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "StoreError::Io",
            Self::Serialization(_) => "StoreError::Serialization",
            Self::NotFound { .. } => "StoreError::NotFound",
            Self::AlreadyExists { .. } => "StoreError::AlreadyExists",
            Self::CapacityExceeded { .. } => "StoreError::CapacityExceeded",
            Self::Validation(_) => "StoreError::Validation",
            Self::Internal(_) => "StoreError::Internal",
        }
    }
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Stored bytes do not describe the message they are filed under.
    #[error("Corrupted message data: {0}")]
    Corrupted(String),
}

/// Store directory and identifier validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Store path is not a directory: {0}")]
    NotDirectory(String),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    /// The batch id cannot be used as a directory name.
    #[error("Invalid batch id for this store: {0}")]
    InvalidBatchId(String),
}

/// Specialized `Result` type for content store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }

    #[test]
    fn test_summary_carries_kind_and_detail() {
        let err = StoreError::from(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "access denied",
        ));

        assert_eq!(err.kind(), "StoreError::Io");
        assert_eq!(err.summary(), "StoreError::Io: I/O error: access denied");
    }

    #[test]
    fn test_not_found_display() {
        let batch_id = BatchId::new("batch");
        let message_id = MessageId::generate();
        let err = StoreError::NotFound {
            batch_id,
            message_id,
        };

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), format!("Message not found: batch/{message_id}"));
    }
}
