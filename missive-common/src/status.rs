use core::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of one message in a batch.
///
/// ```text
/// PrepareSuccess ──► Sent
///        │
///        └─────────► Failed
/// PrepareError (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailState {
    /// Persisted and queued for sending
    PrepareSuccess,
    /// Could not be persisted, never sent
    PrepareError,
    Sent,
    /// Could not be reloaded or the transport refused it
    Failed,
}

impl MailState {
    pub const ALL: [Self; 4] = [
        Self::PrepareSuccess,
        Self::PrepareError,
        Self::Sent,
        Self::Failed,
    ];

    /// No further transition happens out of a terminal state
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::PrepareSuccess)
    }

    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::PrepareError | Self::Failed)
    }

    /// Whether a message currently in `self` may move to `next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::PrepareSuccess, Self::Sent | Self::Failed)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrepareSuccess => "prepare_success",
            Self::PrepareError => "prepare_error",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl Display for MailState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown mail state: {0}")]
pub struct UnknownStateError(String);

impl FromStr for MailState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStateError(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::MailState;

    #[test]
    fn state_machine() {
        assert!(!MailState::PrepareSuccess.is_terminal());
        assert!(MailState::PrepareError.is_terminal());
        assert!(MailState::Sent.is_terminal());
        assert!(MailState::Failed.is_terminal());

        assert!(MailState::PrepareSuccess.can_transition_to(MailState::Sent));
        assert!(MailState::PrepareSuccess.can_transition_to(MailState::Failed));
        assert!(!MailState::PrepareSuccess.can_transition_to(MailState::PrepareError));

        for terminal in [MailState::PrepareError, MailState::Sent, MailState::Failed] {
            for next in MailState::ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn errors() {
        assert!(MailState::PrepareError.is_error());
        assert!(MailState::Failed.is_error());
        assert!(!MailState::Sent.is_error());
        assert!(!MailState::PrepareSuccess.is_error());
    }

    #[test]
    fn parse() {
        for state in MailState::ALL {
            assert_eq!(state.to_string().parse::<MailState>().unwrap(), state);
        }
        assert_eq!("SENT".parse::<MailState>().unwrap(), MailState::Sent);
        assert!("delivered".parse::<MailState>().is_err());
    }
}
