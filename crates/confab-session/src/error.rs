//! Error types for confab-session

use confab_core::TurnId;
use thiserror::Error;

/// Result type alias using confab-session Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session operations
#[derive(Error, Debug)]
pub enum Error {
    /// A stream or regeneration was requested while one is already active
    #[error("a stream is already active for turn {active}")]
    ConcurrentStream { active: TurnId },

    /// An update was attempted on a turn in an incompatible status
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The addressed turn does not exist in this session
    #[error("unknown turn: {0}")]
    UnknownTurn(TurnId),

    /// The transport reported a failure; carries partial content when any
    /// had accumulated
    #[error("transport error: {reason}")]
    Transport {
        reason: String,
        partial: Option<String>,
    },

    /// A regeneration failed; the previous answer was restored
    #[error("regeneration failed, previous answer restored: {reason}")]
    Regeneration { reason: String },

    /// Summarization failed; history left unchanged
    #[error("compaction error: {0}")]
    Compaction(String),

    /// The clipboard collaborator reported a failure
    #[error("clipboard error: {0}")]
    Clipboard(String),

    /// A question-flow operation was invalid
    #[error("question flow error: {0}")]
    Question(String),
}

impl Error {
    /// Whether this error is an expected, recoverable condition (surface to
    /// the user with a retry affordance) rather than a contract violation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::Regeneration { .. }
                | Error::Compaction(_)
                | Error::Clipboard(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(
            Error::Transport {
                reason: "connection reset".into(),
                partial: None
            }
            .is_recoverable()
        );
        assert!(
            Error::Regeneration {
                reason: "timeout".into()
            }
            .is_recoverable()
        );
        assert!(Error::Compaction("model refused".into()).is_recoverable());
        assert!(Error::Clipboard("denied".into()).is_recoverable());
    }

    #[test]
    fn test_contract_violations_not_recoverable() {
        assert!(
            !Error::ConcurrentStream {
                active: TurnId::from("t1")
            }
            .is_recoverable()
        );
        assert!(!Error::InvalidTransition("already complete".into()).is_recoverable());
        assert!(!Error::UnknownTurn(TurnId::from("missing")).is_recoverable());
    }
}
