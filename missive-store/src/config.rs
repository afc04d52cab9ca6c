use std::sync::Arc;

use serde::Deserialize;

use crate::{
    backends::{FileContentStore, MemoryContentStore},
    store::ContentStore,
};

/// Runtime selection of the content store
///
/// File-backed store in RON config:
/// ```ron
/// (
///     type: "File",
///     path: "/var/spool/missive",
/// )
/// ```
///
/// Memory-backed store, optionally bounded:
/// ```ron
/// (
///     type: "Memory",
///     capacity: 1000,
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// Messages survive a restart
    File(FileContentStore),
    /// Messages live as long as the process
    Memory(MemoryConfig),
}

/// Configuration for the memory-backed store
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryConfig {
    /// Maximum number of messages to store (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File(FileContentStore::default())
    }
}

impl StoreConfig {
    /// Get the filesystem path for file-backed stores, if applicable
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(store) => Some(store.path()),
            Self::Memory(_) => None,
        }
    }

    /// Build and initialise the configured store
    ///
    /// # Errors
    /// Returns an error if a file store's root cannot be created or is not a
    /// directory
    pub fn into_content_store(self) -> crate::Result<Arc<dyn ContentStore>> {
        match self {
            Self::File(store) => {
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory(config) => Ok(config.capacity.map_or_else(
                || Arc::new(MemoryContentStore::new()) as Arc<dyn ContentStore>,
                |capacity| Arc::new(MemoryContentStore::with_capacity(capacity)),
            )),
        }
    }
}
