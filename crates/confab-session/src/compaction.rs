//! Context compaction for long conversations
//!
//! When a conversation grows past whatever size signal the caller watches,
//! the coordinator collapses a closed prefix of the history into a single
//! summary entry. The most recent turn is never covered, and failure leaves
//! the history untouched.

use std::sync::Arc;

use async_trait::async_trait;
use confab_core::{CompactionSummary, ConversationTurn, TurnId};

use crate::error::{Error, Result};
use crate::store::TurnStore;
use crate::streaming::StreamController;

/// The summarization collaborator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense the given turns into summary text.
    async fn summarize(&self, turns: &[ConversationTurn]) -> std::result::Result<String, String>;
}

/// Configuration for context compaction
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Keep at least this many of the newest turns out of any compaction
    pub keep_recent_turns: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            keep_recent_turns: 2,
        }
    }
}

/// Result of a completed compaction.
#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    pub summary: CompactionSummary,
    pub turns_before: usize,
    pub turns_after: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompactionState {
    Idle,
    Compacting,
}

/// Select the closed prefix of turns eligible for compaction.
///
/// Returns `None` when the history is too short to compact. The most recent
/// turn is never part of the range.
pub fn candidate_ids(turns: &[ConversationTurn], keep_recent_turns: usize) -> Option<Vec<TurnId>> {
    let keep = keep_recent_turns.max(1);
    if turns.len() <= keep {
        return None;
    }
    Some(turns[..turns.len() - keep].iter().map(|t| t.id.clone()).collect())
}

/// Coordinates compaction runs: `Idle -> Compacting -> Idle`, with failure
/// returning to `Idle` without mutating history.
pub struct CompactionCoordinator {
    config: CompactionConfig,
    state: CompactionState,
}

impl CompactionCoordinator {
    pub fn new(config: CompactionConfig) -> Self {
        Self {
            config,
            state: CompactionState::Idle,
        }
    }

    pub fn is_compacting(&self) -> bool {
        self.state == CompactionState::Compacting
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Run one compaction over the eligible prefix.
    ///
    /// Guards: refuses while another compaction is in flight, and while the
    /// streaming controller has an active stream against a turn inside the
    /// candidate range. On success the covered prefix is atomically swapped
    /// for one summary entry; on failure no mutation occurs.
    pub async fn run(
        &mut self,
        store: &mut TurnStore,
        streaming: &StreamController,
        summarizer: &Arc<dyn Summarizer>,
    ) -> Result<CompactionOutcome> {
        if self.state == CompactionState::Compacting {
            return Err(Error::Compaction("compaction already in progress".into()));
        }

        let ids = candidate_ids(store.list(), self.config.keep_recent_turns)
            .ok_or_else(|| Error::Compaction("not enough turns to compact".into()))?;

        if let Some(active) = streaming.active_turn() {
            if ids.contains(active) {
                return Err(Error::Compaction(format!(
                    "a stream is active for turn {active} inside the compaction range"
                )));
            }
        }

        let covered: Vec<ConversationTurn> = store.list()[..ids.len()].to_vec();
        let turns_before = store.len();

        self.state = CompactionState::Compacting;
        let result = summarizer.summarize(&covered).await;
        self.state = CompactionState::Idle;

        let text = result.map_err(|reason| {
            tracing::warn!(%reason, "summarization failed; history unchanged");
            Error::Compaction(reason)
        })?;

        let summary = store.replace_range(&ids, &text)?;
        Ok(CompactionOutcome {
            summary,
            turns_before,
            turns_after: store.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::{AssistantRole, AssistantTurn, UserTurn};

    struct FixedSummarizer(std::result::Result<String, String>);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(
            &self,
            _turns: &[ConversationTurn],
        ) -> std::result::Result<String, String> {
            self.0.clone()
        }
    }

    fn store_with_completed_turns(n: usize) -> (TurnStore, Vec<TurnId>) {
        let mut store = TurnStore::new();
        let mut ids = Vec::new();
        for i in 0..n {
            let id = store.append(UserTurn::new(format!("q{i}"), vec![]));
            store
                .attach_assistant(&id, AssistantTurn::complete(format!("a{i}")))
                .unwrap();
            ids.push(id);
        }
        (store, ids)
    }

    #[test]
    fn test_candidate_ids_excludes_recent_turns() {
        let (store, ids) = store_with_completed_turns(5);
        let candidates = candidate_ids(store.list(), 2).unwrap();
        assert_eq!(candidates, ids[..3]);
    }

    #[test]
    fn test_candidate_ids_never_covers_most_recent() {
        let (store, ids) = store_with_completed_turns(3);
        // keep_recent_turns of zero still protects the newest turn
        let candidates = candidate_ids(store.list(), 0).unwrap();
        assert_eq!(candidates, ids[..2]);
    }

    #[test]
    fn test_candidate_ids_too_short() {
        let (store, _) = store_with_completed_turns(2);
        assert!(candidate_ids(store.list(), 2).is_none());
    }

    #[tokio::test]
    async fn test_run_swaps_prefix_for_summary() {
        let (mut store, ids) = store_with_completed_turns(5);
        let streaming = StreamController::new();
        let summarizer: Arc<dyn Summarizer> =
            Arc::new(FixedSummarizer(Ok("condensed history".into())));

        let mut coord = CompactionCoordinator::new(CompactionConfig::default());
        let outcome = coord.run(&mut store, &streaming, &summarizer).await.unwrap();

        assert_eq!(outcome.turns_before, 5);
        assert_eq!(outcome.turns_after, 3);
        assert_eq!(outcome.summary.covered_turn_ids, ids[..3]);

        let first = &store.list()[0];
        let entry = first.assistant_turn.as_ref().unwrap();
        assert_eq!(entry.role, AssistantRole::System);
        assert_eq!(entry.content, "condensed history");
        assert_eq!(store.list()[1].id, ids[3]);
        assert_eq!(store.list()[2].id, ids[4]);
        assert!(!coord.is_compacting());
    }

    #[tokio::test]
    async fn test_run_failure_leaves_history_untouched() {
        let (mut store, ids) = store_with_completed_turns(4);
        let streaming = StreamController::new();
        let summarizer: Arc<dyn Summarizer> =
            Arc::new(FixedSummarizer(Err("model refused".into())));

        let mut coord = CompactionCoordinator::new(CompactionConfig::default());
        let err = coord.run(&mut store, &streaming, &summarizer).await.unwrap_err();
        assert!(matches!(err, Error::Compaction(_)));

        assert_eq!(store.len(), 4);
        let listed: Vec<&TurnId> = store.list().iter().map(|t| &t.id).collect();
        assert_eq!(listed, ids.iter().collect::<Vec<_>>());
        assert!(store.archived().is_empty());
        assert!(!coord.is_compacting());
    }

    #[tokio::test]
    async fn test_run_refused_while_stream_active_in_range() {
        let (mut store, ids) = store_with_completed_turns(5);
        let summarizer: Arc<dyn Summarizer> = Arc::new(FixedSummarizer(Ok("s".into())));

        let mut streaming = StreamController::new();
        streaming.begin(ids[0].clone(), true).unwrap();

        let mut coord = CompactionCoordinator::new(CompactionConfig::default());
        let err = coord.run(&mut store, &streaming, &summarizer).await.unwrap_err();
        assert!(matches!(err, Error::Compaction(_)));
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_run_allowed_while_stream_active_at_tail() {
        let (mut store, ids) = store_with_completed_turns(5);
        let summarizer: Arc<dyn Summarizer> = Arc::new(FixedSummarizer(Ok("s".into())));

        let mut streaming = StreamController::new();
        streaming.begin(ids[4].clone(), true).unwrap();

        let mut coord = CompactionCoordinator::new(CompactionConfig::default());
        let outcome = coord.run(&mut store, &streaming, &summarizer).await.unwrap();
        assert_eq!(outcome.turns_after, 3);
    }

    #[tokio::test]
    async fn test_run_refused_while_already_compacting() {
        let (mut store, _) = store_with_completed_turns(5);
        let streaming = StreamController::new();
        let summarizer: Arc<dyn Summarizer> = Arc::new(FixedSummarizer(Ok("s".into())));

        let mut coord = CompactionCoordinator::new(CompactionConfig::default());
        coord.state = CompactionState::Compacting;
        let err = coord.run(&mut store, &streaming, &summarizer).await.unwrap_err();
        assert!(matches!(err, Error::Compaction(_)));
    }
}
