//! Turn store: the ordered, single-writer collection of conversation turns

use confab_core::{
    Artifact, AssistantStatus, AssistantTurn, Citation, CompactionSummary, ConversationTurn,
    DebugTrace, TurnId, UserTurn,
};

use crate::error::{Error, Result};

/// Partial update to an assistant turn. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct AssistantUpdate {
    pub content: Option<String>,
    pub status: Option<AssistantStatus>,
    pub sources: Option<Vec<Citation>>,
    pub artifacts: Option<Vec<Artifact>>,
    pub debug: Option<DebugTrace>,
}

/// Ordered collection of conversation turns.
///
/// The store is the single writer of turn order: turns are appended at the
/// tail, addressed by id, and never reordered. Compacted-away turns move to
/// an archive rather than being deleted.
#[derive(Default)]
pub struct TurnStore {
    turns: Vec<ConversationTurn>,
    archive: Vec<ConversationTurn>,
    summary: Option<CompactionSummary>,
}

impl TurnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn at the tail; returns the generated id.
    pub fn append(&mut self, user_turn: UserTurn) -> TurnId {
        let id = TurnId::generate();
        self.turns.push(ConversationTurn::new(id.clone(), user_turn));
        id
    }

    /// Look up a turn by id.
    pub fn get(&self, id: &TurnId) -> Option<&ConversationTurn> {
        self.turns.iter().find(|t| &t.id == id)
    }

    /// All live turns in append order.
    pub fn list(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns covered by past compactions, in their original order.
    pub fn archived(&self) -> &[ConversationTurn] {
        &self.archive
    }

    /// The most recent compaction summary, if any.
    pub fn compaction_summary(&self) -> Option<&CompactionSummary> {
        self.summary.as_ref()
    }

    /// Attach the assistant response to a turn that has none yet.
    pub fn attach_assistant(&mut self, id: &TurnId, assistant: AssistantTurn) -> Result<()> {
        let turn = self.get_mut(id)?;
        if turn.assistant_turn.is_some() {
            tracing::error!(turn = %id, "attach_assistant on turn that already has a response");
            return Err(Error::InvalidTransition(format!(
                "turn {id} already has an assistant response"
            )));
        }
        turn.assistant_turn = Some(assistant);
        Ok(())
    }

    /// Apply a partial update to an existing assistant turn.
    ///
    /// A `Complete` assistant turn only accepts updates flagged as a
    /// regeneration; anything else is an `InvalidTransition`.
    pub fn update_assistant(
        &mut self,
        id: &TurnId,
        update: AssistantUpdate,
        regeneration: bool,
    ) -> Result<()> {
        let turn = self.get_mut(id)?;
        let assistant = require_assistant(turn)?;
        guard_finalized(id, assistant, regeneration)?;

        if let Some(content) = update.content {
            assistant.content = content;
        }
        if let Some(status) = update.status {
            assistant.status = status;
        }
        if let Some(sources) = update.sources {
            assistant.sources = sources;
        }
        if let Some(artifacts) = update.artifacts {
            assistant.artifacts = artifacts;
        }
        if let Some(debug) = update.debug {
            assistant.debug = Some(debug);
        }
        Ok(())
    }

    /// Swap the whole assistant turn, subject to the same transition rule as
    /// [`update_assistant`]. Used by regeneration (overwrite on success,
    /// restore on failure).
    ///
    /// [`update_assistant`]: TurnStore::update_assistant
    pub fn replace_assistant(
        &mut self,
        id: &TurnId,
        assistant: AssistantTurn,
        regeneration: bool,
    ) -> Result<()> {
        let turn = self.get_mut(id)?;
        let current = require_assistant(turn)?;
        guard_finalized(id, current, regeneration)?;
        turn.assistant_turn = Some(assistant);
        Ok(())
    }

    /// Atomically swap a prefix of the live history for a single summary
    /// entry.
    ///
    /// `ids` must name a non-empty strict prefix of the live order (the most
    /// recent turn can never be covered). The covered turns move to the
    /// archive; the summary entry takes the position of the earliest covered
    /// turn.
    pub fn replace_range(&mut self, ids: &[TurnId], summary_text: &str) -> Result<CompactionSummary> {
        if ids.is_empty() {
            return Err(Error::Compaction("no turns to compact".into()));
        }
        if ids.len() >= self.turns.len() {
            return Err(Error::Compaction(
                "compaction range must exclude the most recent turn".into(),
            ));
        }
        for (turn, id) in self.turns.iter().zip(ids) {
            if &turn.id != id {
                return Err(Error::Compaction(format!(
                    "compaction range is not a prefix of the live history (expected {}, got {id})",
                    turn.id
                )));
            }
        }

        // Summary entry inherits the earliest covered timestamp so the list
        // stays ordered by creation.
        let created_at = self.turns[0].created_at;
        let summary_turn_id = TurnId::generate();
        let entry = ConversationTurn {
            id: summary_turn_id.clone(),
            user_turn: UserTurn {
                content: String::new(),
                attachments: vec![],
                created_at,
            },
            assistant_turn: Some(AssistantTurn {
                created_at,
                ..AssistantTurn::system(summary_text)
            }),
            created_at,
        };

        let covered: Vec<ConversationTurn> = self.turns.drain(..ids.len()).collect();
        self.archive.extend(covered);
        self.turns.insert(0, entry);

        let summary = CompactionSummary {
            text: summary_text.to_string(),
            covered_turn_ids: ids.to_vec(),
            summary_turn_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Drop all live turns, the archive, and the compaction summary.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.archive.clear();
        self.summary = None;
    }

    fn get_mut(&mut self, id: &TurnId) -> Result<&mut ConversationTurn> {
        self.turns
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| Error::UnknownTurn(id.clone()))
    }
}

fn require_assistant(turn: &mut ConversationTurn) -> Result<&mut AssistantTurn> {
    let id = turn.id.clone();
    turn.assistant_turn.as_mut().ok_or_else(|| {
        Error::InvalidTransition(format!("turn {id} has no assistant response to update"))
    })
}

fn guard_finalized(id: &TurnId, assistant: &AssistantTurn, regeneration: bool) -> Result<()> {
    if assistant.status == AssistantStatus::Complete && !regeneration {
        tracing::error!(turn = %id, "update on complete assistant turn without regeneration flag");
        return Err(Error::InvalidTransition(format!(
            "assistant turn {id} is complete; updates require an explicit regeneration"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::AssistantRole;

    fn store_with(n: usize) -> (TurnStore, Vec<TurnId>) {
        let mut store = TurnStore::new();
        let ids = (0..n)
            .map(|i| store.append(UserTurn::new(format!("message {i}"), vec![])))
            .collect();
        (store, ids)
    }

    #[test]
    fn test_append_preserves_order_with_unique_ids() {
        let (store, ids) = store_with(5);
        let listed: Vec<&TurnId> = store.list().iter().map(|t| &t.id).collect();
        assert_eq!(listed, ids.iter().collect::<Vec<_>>());
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_attach_assistant_once() {
        let (mut store, ids) = store_with(1);
        store
            .attach_assistant(&ids[0], AssistantTurn::complete("hello"))
            .unwrap();
        let err = store
            .attach_assistant(&ids[0], AssistantTurn::complete("again"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[test]
    fn test_update_complete_requires_regeneration_flag() {
        let (mut store, ids) = store_with(1);
        store
            .attach_assistant(&ids[0], AssistantTurn::complete("first"))
            .unwrap();

        let update = AssistantUpdate {
            content: Some("second".into()),
            ..Default::default()
        };
        let err = store
            .update_assistant(&ids[0], update.clone(), false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        store.update_assistant(&ids[0], update, true).unwrap();
        assert_eq!(
            store.get(&ids[0]).unwrap().assistant_turn.as_ref().unwrap().content,
            "second"
        );
    }

    #[test]
    fn test_update_errored_allowed_without_flag() {
        let (mut store, ids) = store_with(1);
        store
            .attach_assistant(&ids[0], AssistantTurn::errored("par"))
            .unwrap();
        store
            .update_assistant(
                &ids[0],
                AssistantUpdate {
                    status: Some(AssistantStatus::Errored),
                    content: Some("partial".into()),
                    ..Default::default()
                },
                false,
            )
            .unwrap();
    }

    #[test]
    fn test_unknown_turn() {
        let (mut store, _) = store_with(1);
        let missing = TurnId::from("nope");
        let err = store
            .attach_assistant(&missing, AssistantTurn::complete("x"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTurn(_)));
    }

    #[test]
    fn test_replace_range_swaps_prefix_for_summary() {
        let (mut store, ids) = store_with(5);
        let covered: Vec<TurnId> = ids[..3].to_vec();

        let summary = store.replace_range(&covered, "what happened earlier").unwrap();
        assert_eq!(summary.covered_turn_ids, covered);

        // (5 - 3) + 1 entries, summary first, tail unchanged in order
        assert_eq!(store.len(), 3);
        let first = &store.list()[0];
        assert_eq!(first.id, summary.summary_turn_id);
        let entry = first.assistant_turn.as_ref().unwrap();
        assert_eq!(entry.role, AssistantRole::System);
        assert_eq!(entry.content, "what happened earlier");
        assert_eq!(store.list()[1].id, ids[3]);
        assert_eq!(store.list()[2].id, ids[4]);

        // covered turns retained, not deleted
        let archived: Vec<&TurnId> = store.archived().iter().map(|t| &t.id).collect();
        assert_eq!(archived, covered.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_replace_range_rejects_full_history() {
        let (mut store, ids) = store_with(3);
        let err = store.replace_range(&ids, "all of it").unwrap_err();
        assert!(matches!(err, Error::Compaction(_)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_replace_range_rejects_non_prefix() {
        let (mut store, ids) = store_with(4);
        let not_prefix = vec![ids[1].clone(), ids[2].clone()];
        let err = store.replace_range(&not_prefix, "middle").unwrap_err();
        assert!(matches!(err, Error::Compaction(_)));
        assert_eq!(store.len(), 4);
        assert!(store.archived().is_empty());
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut store, ids) = store_with(4);
        store.replace_range(&ids[..2], "summary").unwrap();
        store.clear();
        assert!(store.is_empty());
        assert!(store.archived().is_empty());
        assert!(store.compaction_summary().is_none());
    }
}
