use std::time::Duration;

use serde::Deserialize;

const fn default_queue_capacity() -> usize {
    1000
}

const fn default_enqueue_timeout() -> u64 {
    5000 // 5 seconds
}

const fn default_delete_on_success() -> bool {
    true
}

const fn default_status_retention() -> u64 {
    300_000 // 5 minutes
}

/// Tuning of the two-stage pipeline
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum number of batches waiting to be prepared
    #[serde(default = "default_queue_capacity")]
    pub prepare_queue_capacity: usize,

    /// Maximum number of prepared messages waiting to be sent
    ///
    /// When full, preparation waits for the send stage to catch up.
    #[serde(default = "default_queue_capacity")]
    pub send_queue_capacity: usize,

    /// How long a batch submission waits for room in the prepare queue
    /// (in milliseconds)
    #[serde(default = "default_enqueue_timeout")]
    pub enqueue_timeout_ms: u64,

    /// Remove a message from the content store once it has been sent
    ///
    /// Messages that failed are always kept.
    #[serde(default = "default_delete_on_success")]
    pub delete_on_success: bool,

    /// How long the status of a processed batch stays queryable by id
    /// (in milliseconds)
    #[serde(default = "default_status_retention")]
    pub status_retention_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            prepare_queue_capacity: default_queue_capacity(),
            send_queue_capacity: default_queue_capacity(),
            enqueue_timeout_ms: default_enqueue_timeout(),
            delete_on_success: default_delete_on_success(),
            status_retention_ms: default_status_retention(),
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub const fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    #[must_use]
    pub const fn status_retention(&self) -> Duration {
        Duration::from_millis(self.status_retention_ms)
    }
}
