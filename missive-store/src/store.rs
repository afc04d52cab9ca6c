use async_trait::async_trait;
use missive_common::{BatchId, MailMessage, MessageId, Session};

/// Storage for messages that have been prepared but not yet sent.
///
/// Implementations are shared between the prepare and send workers and must
/// be safe to call concurrently.
#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug {
    /// Persist a message, returning the key it can be loaded back with.
    ///
    /// Every call generates a fresh key, so saving the same message twice
    /// stores two copies. A key that is already taken fails with
    /// [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists).
    async fn save(&self, batch_id: &BatchId, message: &MailMessage) -> crate::Result<MessageId>;

    /// Load a previously saved message.
    ///
    /// The session is the one the batch will be sent with; stores that have
    /// to rebuild transport-specific message objects need it.
    async fn load(
        &self,
        session: &Session,
        batch_id: &BatchId,
        message_id: &MessageId,
    ) -> crate::Result<MailMessage>;

    async fn delete(&self, batch_id: &BatchId, message_id: &MessageId) -> crate::Result<()>;

    /// Ids of every message stored for a batch, oldest first
    async fn list(&self, batch_id: &BatchId) -> crate::Result<Vec<MessageId>>;
}
