//! Per-message status tracking and per-batch aggregation

mod listener;
mod registry;
mod result;

pub use listener::{MailListener, MemoryMailListener};
pub use registry::StatusRegistry;
pub use result::{MailStatus, MailStatusResult};
