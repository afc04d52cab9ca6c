//! Persistence of prepared messages between the prepare and send stages.
//!
//! The prepare stage saves each message under `(batch id, message id)` and the
//! send stage reloads it from there, so only keys travel through the send
//! queue.

pub mod backends;
pub mod config;
pub mod error;
pub mod store;

pub use backends::{FileContentStore, FileContentStoreBuilder, MemoryContentStore, TestContentStore};
pub use config::{MemoryConfig, StoreConfig};
pub use error::{Result, SerializationError, StoreError, ValidationError};
pub use store::ContentStore;
