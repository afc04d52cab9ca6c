use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use missive_common::{BatchId, MailMessage, MessageId, Session};

use crate::{StoreError, store::ContentStore};

/// In-memory content store
///
/// Messages are kept per batch in a `BTreeMap` keyed by message id, so listing
/// a batch yields ids in creation order without a separate sort.
///
/// # Capacity Management
/// The store can be given a maximum number of messages across all batches.
/// Once it is reached, `save` fails with [`StoreError::CapacityExceeded`]
/// until something is deleted. A capacity of zero rejects every save, which
/// is how tests provoke per-message preparation failures.
///
/// # Concurrency
/// Uses an `RwLock`; a lock is never held across an await point.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    pub(crate) batches: Arc<RwLock<HashMap<BatchId, BTreeMap<MessageId, MailMessage>>>>,
    /// Maximum number of messages to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryContentStore {
    /// Create a new empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store holding at most `capacity` messages
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            batches: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Number of messages across all batches
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batches
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .map(BTreeMap::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub(crate) fn clear(&self) {
        self.batches
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn save(&self, batch_id: &BatchId, message: &MailMessage) -> crate::Result<MessageId> {
        let message_id = MessageId::generate();
        let mut batches = self.batches.write()?;

        if let Some(capacity) = self.capacity {
            let len: usize = batches.values().map(BTreeMap::len).sum();
            if len >= capacity {
                return Err(StoreError::CapacityExceeded { len, capacity });
            }
        }

        let batch = batches.entry(batch_id.clone()).or_default();
        if batch.contains_key(&message_id) {
            return Err(StoreError::AlreadyExists {
                batch_id: batch_id.clone(),
                message_id,
            });
        }

        batch.insert(message_id, message.clone());
        Ok(message_id)
    }

    async fn load(
        &self,
        _session: &Session,
        batch_id: &BatchId,
        message_id: &MessageId,
    ) -> crate::Result<MailMessage> {
        self.batches
            .read()?
            .get(batch_id)
            .and_then(|batch| batch.get(message_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                batch_id: batch_id.clone(),
                message_id: *message_id,
            })
    }

    async fn delete(&self, batch_id: &BatchId, message_id: &MessageId) -> crate::Result<()> {
        let mut batches = self.batches.write()?;
        let not_found = || StoreError::NotFound {
            batch_id: batch_id.clone(),
            message_id: *message_id,
        };

        let batch = batches.get_mut(batch_id).ok_or_else(not_found)?;
        batch.remove(message_id).ok_or_else(not_found)?;

        if batch.is_empty() {
            batches.remove(batch_id);
        }

        Ok(())
    }

    async fn list(&self, batch_id: &BatchId) -> crate::Result<Vec<MessageId>> {
        Ok(self
            .batches
            .read()?
            .get(batch_id)
            .map(|batch| batch.keys().copied().collect())
            .unwrap_or_default())
    }
}
