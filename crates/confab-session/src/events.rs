//! Session event types

use confab_core::TurnId;
use serde::{Deserialize, Serialize};

/// Events emitted by the session facade as state changes.
///
/// Views subscribe through [`ChatSession::subscribe`] and re-render on
/// whatever subset they care about.
///
/// [`ChatSession::subscribe`]: crate::session::ChatSession::subscribe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A user turn was appended to the history
    TurnAppended { turn_id: TurnId },

    /// A response stream started
    StreamStarted { turn_id: TurnId, regeneration: bool },

    /// An increment of assistant text arrived
    StreamDelta { turn_id: TurnId, text: String },

    /// The response completed and was committed to the turn
    StreamCompleted { turn_id: TurnId },

    /// The response failed; partial content preserved on the turn
    StreamErrored { turn_id: TurnId, reason: String },

    /// The response was cancelled by the user
    StreamCancelled { turn_id: TurnId },

    /// A regeneration failed and the previous answer was put back
    RegenerationRestored { turn_id: TurnId, reason: String },

    /// Context compaction started
    CompactionStarted,

    /// Context compaction completed
    CompactionCompleted {
        turns_before: usize,
        turns_after: usize,
    },

    /// Context compaction failed; history unchanged
    CompactionFailed { reason: String },

    /// A structured-question flow started
    QuestionsStarted,

    /// The question flow was committed as a user turn
    QuestionsCommitted { turn_id: TurnId },

    /// The question flow was discarded
    QuestionsCancelled,
}

impl SessionEvent {
    /// Check if this event ends an in-flight response stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::StreamCompleted { .. }
                | SessionEvent::StreamErrored { .. }
                | SessionEvent::StreamCancelled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_serialize_tagged() {
        let event = SessionEvent::StreamDelta {
            turn_id: TurnId::from("t1"),
            text: "Hel".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stream_delta");
        assert_eq!(json["text"], "Hel");

        let back: SessionEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, SessionEvent::StreamDelta { .. }));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(
            SessionEvent::StreamCompleted {
                turn_id: TurnId::from("t1")
            }
            .is_terminal()
        );
        assert!(
            SessionEvent::StreamCancelled {
                turn_id: TurnId::from("t1")
            }
            .is_terminal()
        );
        assert!(!SessionEvent::CompactionStarted.is_terminal());
        assert!(
            !SessionEvent::TurnAppended {
                turn_id: TurnId::from("t1")
            }
            .is_terminal()
        );
    }
}
