//! Regeneration: snapshot and restore around a re-issued response
//!
//! The streaming buffer never touches the store before finalization, so a
//! failed regeneration cannot corrupt the previous answer; the explicit
//! snapshot/restore pair makes the rollback contract observable regardless
//! of how the attempt ends.

use confab_core::{AssistantTurn, TurnId};

use crate::error::{Error, Result};
use crate::store::TurnStore;

/// Captured assistant turn used to roll back a failed regeneration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    turn_id: TurnId,
    previous: AssistantTurn,
}

impl Snapshot {
    pub fn turn_id(&self) -> &TurnId {
        &self.turn_id
    }
}

/// Capture the current assistant response of a turn before regenerating it.
///
/// The turn must hold a non-streaming response (`Complete` or `Errored`).
pub fn snapshot(store: &TurnStore, turn_id: &TurnId) -> Result<Snapshot> {
    let turn = store
        .get(turn_id)
        .ok_or_else(|| Error::UnknownTurn(turn_id.clone()))?;
    let assistant = turn.assistant_turn.as_ref().ok_or_else(|| {
        Error::InvalidTransition(format!("turn {turn_id} has no assistant response to regenerate"))
    })?;
    if !assistant.is_final() {
        return Err(Error::InvalidTransition(format!(
            "turn {turn_id} is still streaming; cannot regenerate"
        )));
    }
    Ok(Snapshot {
        turn_id: turn_id.clone(),
        previous: assistant.clone(),
    })
}

/// Put the previously captured answer back after a failed or cancelled
/// regeneration.
pub fn restore(store: &mut TurnStore, snapshot: Snapshot) -> Result<()> {
    store.replace_assistant(&snapshot.turn_id, snapshot.previous, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::{AssistantStatus, UserTurn};

    #[test]
    fn test_snapshot_requires_final_response() {
        let mut store = TurnStore::new();
        let id = store.append(UserTurn::new("hi", vec![]));

        // no assistant yet
        let err = snapshot(&store, &id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        store
            .attach_assistant(
                &id,
                AssistantTurn::new(
                    confab_core::AssistantRole::Assistant,
                    "",
                    AssistantStatus::Streaming,
                ),
            )
            .unwrap();
        let err = snapshot(&store, &id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[test]
    fn test_restore_puts_previous_answer_back() {
        let mut store = TurnStore::new();
        let id = store.append(UserTurn::new("hi", vec![]));
        store
            .attach_assistant(&id, AssistantTurn::complete("the good answer"))
            .unwrap();

        let snap = snapshot(&store, &id).unwrap();

        // simulate a successful overwrite followed by a rollback request
        store
            .replace_assistant(&id, AssistantTurn::errored("garbage"), true)
            .unwrap();
        restore(&mut store, snap).unwrap();

        let assistant = store.get(&id).unwrap().assistant_turn.as_ref().unwrap();
        assert_eq!(assistant.content, "the good answer");
        assert_eq!(assistant.status, AssistantStatus::Complete);
    }

    #[test]
    fn test_snapshot_unknown_turn() {
        let store = TurnStore::new();
        let err = snapshot(&store, &TurnId::from("missing")).unwrap_err();
        assert!(matches!(err, Error::UnknownTurn(_)));
    }
}
