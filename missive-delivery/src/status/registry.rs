use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use missive_common::{BatchId, tracing::debug};

use crate::status::MailStatusResult;

/// Batch status results by batch id, shared by both queues and the sender.
///
/// With a retention set, a batch is dropped that long after it was processed.
/// Without one, batches stay until [`remove`](Self::remove) is called.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    results: Arc<DashMap<BatchId, Arc<MailStatusResult>>>,
    retention: Option<Duration>,
}

impl StatusRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that evicts processed batches after `retention`.
    ///
    /// Registering must then happen inside a Tokio runtime.
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            results: Arc::default(),
            retention: Some(retention),
        }
    }

    /// Track `result` under `batch_id`. The first registration wins.
    pub fn register(&self, batch_id: BatchId, result: Arc<MailStatusResult>) {
        match self.results.entry(batch_id.clone()) {
            Entry::Occupied(_) => return,
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&result));
            }
        }

        if let Some(retention) = self.retention {
            self.evict_when_processed(batch_id, result, retention);
        }
    }

    fn evict_when_processed(
        &self,
        batch_id: BatchId,
        result: Arc<MailStatusResult>,
        retention: Duration,
    ) {
        let results = Arc::downgrade(&self.results);

        tokio::spawn(async move {
            result.processed().await;
            tokio::time::sleep(retention).await;

            let Some(results) = results.upgrade() else {
                return;
            };
            // Only if it was not forgotten and re-registered in the meantime
            if results
                .remove_if(&batch_id, |_, tracked| Arc::ptr_eq(tracked, &result))
                .is_some()
            {
                debug!(batch_id = %batch_id, "Evicted processed batch");
            }
        });
    }

    pub fn get(&self, batch_id: &BatchId) -> Option<Arc<MailStatusResult>> {
        self.results
            .get(batch_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Stop tracking a batch, returning its result
    pub fn remove(&self, batch_id: &BatchId) -> Option<Arc<MailStatusResult>> {
        self.results.remove(batch_id).map(|(_, result)| result)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let registry = StatusRegistry::new();
        let batch = BatchId::new("batch");
        let first = Arc::new(MailStatusResult::new());

        registry.register(batch.clone(), Arc::clone(&first));
        registry.register(batch.clone(), Arc::new(MailStatusResult::new()));

        let tracked = registry.get(&batch).expect("registered");
        assert!(Arc::ptr_eq(&tracked, &first));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&batch).is_some());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_processed_batches_are_evicted() {
        let registry = StatusRegistry::with_retention(Duration::from_millis(10));
        let batch = BatchId::new("batch");
        let result = Arc::new(MailStatusResult::new());

        registry.register(batch.clone(), Arc::clone(&result));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.get(&batch).is_some(), "Unfinished batches are kept");

        result.finish_preparation();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Processed batch was not evicted");
    }

    #[test]
    fn test_without_retention_batches_stay() {
        let registry = StatusRegistry::new();
        let result = Arc::new(MailStatusResult::new());
        result.finish_preparation();

        registry.register(BatchId::new("batch"), result);
        assert_eq!(registry.len(), 1);
    }
}
