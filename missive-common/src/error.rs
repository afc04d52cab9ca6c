//! Error reporting shared by every crate.

/// Renders an error as the one-line summary stored in a status entry.
///
/// The summary names the kind of failure first so that entries can be
/// grouped without parsing transport-specific wording.
pub trait ErrorSummary: std::error::Error {
    /// Stable name of the failure, e.g. `TransportError::Connection`
    fn kind(&self) -> &'static str;

    fn summary(&self) -> String {
        format!("{}: {self}", self.kind())
    }
}
