//! The capability used by the send stage to transmit a message

mod smtp;

use async_trait::async_trait;
use missive_common::{MailMessage, Session};

pub use smtp::SmtpTransport;

use crate::error::TransportError;

/// Transmits fully formed messages.
///
/// Implementations must be safe to share between tasks. The session is the
/// one the batch was submitted with and is never modified.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn send(&self, message: &MailMessage, session: &Session) -> Result<(), TransportError>;
}
