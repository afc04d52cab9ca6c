use std::time::Duration;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use missive_common::{BatchId, MailState, MessageId, tracing::warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The last known state of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailStatus {
    pub batch_id: BatchId,
    pub message_id: MessageId,
    pub state: MailState,
    /// `<error kind>: <error message>` for error states
    pub error_summary: Option<String>,
    /// When the state was last changed
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ResultState {
    entries: Vec<MailStatus>,
    index: AHashMap<MessageId, usize>,
    terminal: usize,
    expected: usize,
    prepare_finished: bool,
    fatal_error: Option<String>,
}

impl ResultState {
    const fn is_processed(&self) -> bool {
        self.prepare_finished && self.terminal >= self.expected
    }
}

/// Aggregated status of one batch.
///
/// Both workers write to it through a listener while any number of callers
/// read it. The batch counts as processed once preparation has ended and as
/// many messages have reached a terminal state as preparation discovered.
/// From then on it no longer changes.
#[derive(Debug)]
pub struct MailStatusResult {
    state: Mutex<ResultState>,
    processed: watch::Sender<bool>,
}

impl Default for MailStatusResult {
    fn default() -> Self {
        Self::new()
    }
}

impl MailStatusResult {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::default(),
            processed: watch::Sender::new(false),
        }
    }

    /// Record a state change for a message.
    ///
    /// The first record for a message may carry any state. Afterwards only
    /// `PrepareSuccess -> Sent | Failed` is accepted; anything else is logged
    /// and ignored, so terminal entries are never overwritten. Returns whether
    /// the change was applied.
    pub fn record(
        &self,
        batch_id: &BatchId,
        message_id: MessageId,
        state: MailState,
        error_summary: Option<String>,
    ) -> bool {
        let mut inner = self.state.lock();

        if let Some(&position) = inner.index.get(&message_id) {
            let current = inner.entries[position].state;
            if !current.can_transition_to(state) {
                warn!(
                    batch_id = %batch_id,
                    message_id = %message_id,
                    from = %current,
                    to = %state,
                    "Ignoring illegal status transition"
                );
                return false;
            }

            let entry = &mut inner.entries[position];
            entry.state = state;
            entry.error_summary = error_summary;
            entry.timestamp = Utc::now();
        } else {
            let position = inner.entries.len();
            inner.entries.push(MailStatus {
                batch_id: batch_id.clone(),
                message_id,
                state,
                error_summary,
                timestamp: Utc::now(),
            });
            inner.index.insert(message_id, position);
        }

        if state.is_terminal() {
            inner.terminal += 1;
        }

        self.publish(&inner);
        true
    }

    /// Record the outcome of preparing one message and count it towards the
    /// batch size in the same step.
    ///
    /// A message id that is already tracked is neither recorded nor counted,
    /// so the batch can still complete when a store hands out a key twice.
    pub fn record_prepared(
        &self,
        batch_id: &BatchId,
        message_id: MessageId,
        state: MailState,
        error_summary: Option<String>,
    ) -> bool {
        let mut inner = self.state.lock();

        if inner.index.contains_key(&message_id) {
            warn!(
                batch_id = %batch_id,
                message_id = %message_id,
                state = %state,
                "Message prepared twice under the same id, not counting it again"
            );
            return false;
        }

        let position = inner.entries.len();
        inner.entries.push(MailStatus {
            batch_id: batch_id.clone(),
            message_id,
            state,
            error_summary,
            timestamp: Utc::now(),
        });
        inner.index.insert(message_id, position);
        inner.expected += 1;
        if state.is_terminal() {
            inner.terminal += 1;
        }

        self.publish(&inner);
        true
    }

    /// Account for one more message discovered by preparation
    pub fn increment_current_size(&self) {
        let mut inner = self.state.lock();
        inner.expected += 1;
        self.publish(&inner);
    }

    /// Mark preparation as ended; the expected size is final from here on
    pub fn finish_preparation(&self) {
        let mut inner = self.state.lock();
        inner.prepare_finished = true;
        self.publish(&inner);
    }

    /// Remember why the message source stopped early
    pub fn record_fatal_error(&self, summary: String) {
        self.state.lock().fatal_error = Some(summary);
    }

    fn publish(&self, inner: &ResultState) {
        let processed = inner.is_processed();
        self.processed.send_if_modified(|current| {
            let changed = *current != processed;
            *current = processed;
            changed
        });
    }

    /// Entries in the given state, in the order messages were first recorded.
    ///
    /// Every call iterates a fresh snapshot, so calling it again on a
    /// processed batch yields the same entries.
    pub fn get_by_state(&self, state: MailState) -> impl Iterator<Item = MailStatus> + use<> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.state == state)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn get_all(&self) -> Vec<MailStatus> {
        self.state.lock().entries.clone()
    }

    /// Entries in `PrepareError` or `Failed`
    pub fn get_all_errors(&self) -> Vec<MailStatus> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.state.is_error())
            .cloned()
            .collect()
    }

    /// Number of messages with a recorded status
    pub fn total_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Number of messages in a terminal state
    pub fn processed_count(&self) -> usize {
        self.state.lock().terminal
    }

    /// Number of messages preparation has discovered so far
    pub fn expected_count(&self) -> usize {
        self.state.lock().expected
    }

    pub fn is_prepare_finished(&self) -> bool {
        self.state.lock().prepare_finished
    }

    pub fn fatal_error(&self) -> Option<String> {
        self.state.lock().fatal_error.clone()
    }

    pub fn is_processed(&self) -> bool {
        *self.processed.borrow()
    }

    /// Resolves once the batch is processed
    pub async fn processed(&self) {
        let mut processed = self.processed.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = processed.wait_for(|done| *done).await;
    }

    /// Wait until the batch is processed. Returns `false` on timeout.
    pub async fn wait_till_processed(&self, timeout: Duration) -> bool {
        let mut processed = self.processed.subscribe();
        tokio::time::timeout(timeout, processed.wait_for(|done| *done))
            .await
            .is_ok_and(|result| result.is_ok())
    }

    /// One line per failed message, `None` if nothing failed
    pub fn serialize_errors(&self) -> Option<String> {
        let inner = self.state.lock();
        let lines: Vec<String> = inner
            .entries
            .iter()
            .filter(|entry| entry.state.is_error())
            .map(|entry| {
                format!(
                    "{} {}: {}",
                    entry.message_id,
                    entry.state,
                    entry.error_summary.as_deref().unwrap_or_default()
                )
            })
            .chain(inner.fatal_error.iter().map(|fatal| format!("source: {fatal}")))
            .collect();

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}
