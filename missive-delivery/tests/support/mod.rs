//! Test doubles for the pipeline's collaborators
#![allow(dead_code)] // Not every test binary uses every double

pub mod mock_server;

use std::sync::Arc;

use async_trait::async_trait;
use missive_common::{BatchId, ContextProvider, MailMessage, MessageId, Session};
use missive_delivery::{Transport, TransportError};
use missive_store::{ContentStore, MemoryContentStore};
use parking_lot::Mutex;

pub fn message(to: &str, subject: &str) -> MailMessage {
    MailMessage::builder()
        .from("wiki@example.org")
        .to(to)
        .subject(subject)
        .body("Hello from the wiki")
        .build()
}

/// Transport that accepts everything except messages addressed to
/// `fail_for`, recording what it accepted and the wiki active at the time
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<MailMessage>>,
    pub wikis: Mutex<Vec<Option<String>>>,
    fail_for: Option<String>,
    contexts: Option<Arc<dyn ContextProvider>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipient: &str) -> Self {
        Self {
            fail_for: Some(recipient.to_string()),
            ..Self::new()
        }
    }

    pub fn observing(contexts: Arc<dyn ContextProvider>) -> Self {
        Self {
            contexts: Some(contexts),
            ..Self::new()
        }
    }

    pub fn sent_subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|message| message.subject.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &MailMessage, _session: &Session) -> Result<(), TransportError> {
        if let Some(contexts) = &self.contexts {
            self.wikis
                .lock()
                .push(contexts.current().map(|context| context.wiki_id));
        }

        if self
            .fail_for
            .as_deref()
            .is_some_and(|recipient| message.recipients().any(|to| to == recipient))
        {
            return Err(TransportError::Rejected(format!(
                "550 mailbox unavailable: {}",
                message.to.join(", ")
            )));
        }

        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Transport that panics on every message
#[derive(Debug, Default)]
pub struct PanickingTransport;

#[async_trait]
impl Transport for PanickingTransport {
    async fn send(&self, _message: &MailMessage, _session: &Session) -> Result<(), TransportError> {
        panic!("transport blew up");
    }
}

/// Memory store that remembers which wiki was active on every save
#[derive(Debug)]
pub struct ObservingStore {
    pub inner: MemoryContentStore,
    pub wikis: Mutex<Vec<Option<String>>>,
    contexts: Arc<dyn ContextProvider>,
}

impl ObservingStore {
    pub fn new(contexts: Arc<dyn ContextProvider>) -> Self {
        Self {
            inner: MemoryContentStore::new(),
            wikis: Mutex::new(Vec::new()),
            contexts,
        }
    }
}

#[async_trait]
impl ContentStore for ObservingStore {
    async fn save(
        &self,
        batch_id: &BatchId,
        message: &MailMessage,
    ) -> missive_store::Result<MessageId> {
        self.wikis
            .lock()
            .push(self.contexts.current().map(|context| context.wiki_id));
        self.inner.save(batch_id, message).await
    }

    async fn load(
        &self,
        session: &Session,
        batch_id: &BatchId,
        message_id: &MessageId,
    ) -> missive_store::Result<MailMessage> {
        self.inner.load(session, batch_id, message_id).await
    }

    async fn delete(&self, batch_id: &BatchId, message_id: &MessageId) -> missive_store::Result<()> {
        self.inner.delete(batch_id, message_id).await
    }

    async fn list(&self, batch_id: &BatchId) -> missive_store::Result<Vec<MessageId>> {
        self.inner.list(batch_id).await
    }
}
