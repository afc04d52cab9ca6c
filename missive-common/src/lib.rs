//! Shared vocabulary for the missive mail pipeline.
//!
//! Everything that more than one crate needs to agree on lives here: batch and
//! message identifiers, the message and transport session types, the scoped
//! execution context, the per-message lifecycle state, and logging.

pub mod context;
pub mod error;
pub mod id;
pub mod logging;
pub mod message;
pub mod session;
pub mod status;

pub use context::{ContextProvider, ContextScope, ContextStack, ExecutionContext};
pub use error::ErrorSummary;
pub use id::{BatchId, MessageId};
pub use message::{MailMessage, MailMessageBuilder};
pub use session::{Credentials, Session, TlsMode};
pub use status::MailState;
pub use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
}
