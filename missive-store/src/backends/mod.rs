//! Content store implementations
//!
//! - `memory`: In-memory storage for tests and transient batches
//! - `test`: Memory storage with synchronisation helpers for tests
//! - `file`: File-based storage that survives restarts

pub mod file;
pub mod memory;

pub use file::{FileContentStore, FileContentStoreBuilder};
pub use memory::MemoryContentStore;
pub use test::TestContentStore;
