//! Session facade: the single interface consumed by presentational views
//!
//! Composes the turn store, streaming controller, regeneration coordinator,
//! compaction coordinator, and pending-question flow. Views read snapshots
//! and subscribe to [`SessionEvent`]s; all mutation goes through the write
//! surface here.

use std::sync::Arc;

use confab_core::{
    Attachment, CompactionSummary, ConversationTurn, Question, TurnId, UserTurn,
};
use futures::StreamExt;
use tokio::sync::broadcast;

use crate::clipboard::Clipboard;
use crate::compaction::{CompactionConfig, CompactionCoordinator, CompactionOutcome, Summarizer};
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::handle::SessionHandle;
use crate::question::{PendingQuestion, QuestionPhase};
use crate::regenerate::{self, Snapshot};
use crate::store::TurnStore;
use crate::streaming::StreamController;
use crate::transport::{ResponseMeta, Transport, TransportEvent, TransportRequest};

/// Session configuration
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Context compaction configuration
    pub compaction: CompactionConfig,
    /// Whether debug traces are surfaced to views initially
    pub debug_mode: bool,
}

/// How a stream attempt ended.
enum StreamOutcome {
    Completed(ResponseMeta),
    Failed(String),
    Cancelled,
}

/// The conversation state engine behind one chat session.
pub struct ChatSession {
    config: SessionConfig,
    store: TurnStore,
    streaming: StreamController,
    compaction: CompactionCoordinator,
    pending_question: Option<PendingQuestion>,
    transport: Arc<dyn Transport>,
    summarizer: Arc<dyn Summarizer>,
    clipboard: Arc<dyn Clipboard>,
    event_tx: broadcast::Sender<SessionEvent>,
    handle: SessionHandle,
    last_error: Option<String>,
    debug_mode: bool,
}

impl ChatSession {
    /// Create a new session over the given collaborators.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        summarizer: Arc<dyn Summarizer>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            compaction: CompactionCoordinator::new(config.compaction.clone()),
            debug_mode: config.debug_mode,
            config,
            store: TurnStore::new(),
            streaming: StreamController::new(),
            pending_question: None,
            transport,
            summarizer,
            clipboard,
            event_tx,
            handle: SessionHandle::new(),
            last_error: None,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Get a cloneable handle for aborting and idle-waiting from outside.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ---- Read model ----

    /// All live turns in append order.
    pub fn turns(&self) -> &[ConversationTurn] {
        self.store.list()
    }

    /// Turns covered by past compactions.
    pub fn archived_turns(&self) -> &[ConversationTurn] {
        self.store.archived()
    }

    /// The accumulated text of the in-flight response, if one is streaming.
    pub fn streaming_content(&self) -> Option<&str> {
        self.streaming.streaming_content()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_streaming()
    }

    pub fn is_compacting(&self) -> bool {
        self.compaction.is_compacting()
    }

    pub fn compaction_summary(&self) -> Option<&CompactionSummary> {
        self.store.compaction_summary()
    }

    pub fn pending_question(&self) -> Option<&PendingQuestion> {
        self.pending_question.as_ref()
    }

    /// True from the moment a user-initiated action is issued until it
    /// reaches a terminal state. Gates input controls in consuming views.
    pub fn loading(&self) -> bool {
        self.handle.is_running() || self.compaction.is_compacting()
    }

    /// The most recent stream error, cleared when a new stream starts.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn set_debug_mode(&mut self, on: bool) {
        self.debug_mode = on;
    }

    // ---- Write surface ----

    /// Commit a user message and stream the assistant response for it.
    ///
    /// Returns the new turn's id. A transport failure is returned as an
    /// error, but the turn stays committed with the partial response and
    /// status `Errored`.
    pub async fn send_message(
        &mut self,
        content: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<TurnId> {
        let (turn_id, request) = self.append_user_turn(content.into(), attachments)?;
        self.run_stream(turn_id.clone(), request, false, None).await?;
        Ok(turn_id)
    }

    /// Re-request the assistant response for an existing turn.
    ///
    /// On success the turn's content is replaced; on failure (or
    /// cancellation) the previous answer is restored and a `Regeneration`
    /// error is returned.
    pub async fn handle_regenerate(&mut self, turn_id: &TurnId) -> Result<()> {
        if let Some(active) = self.streaming.active_turn() {
            if active != turn_id {
                return Err(Error::ConcurrentStream {
                    active: active.clone(),
                });
            }
        }
        let snapshot = regenerate::snapshot(&self.store, turn_id)?;
        let turn = self
            .store
            .get(turn_id)
            .ok_or_else(|| Error::UnknownTurn(turn_id.clone()))?;
        let request = TransportRequest::new(
            turn.user_turn.content.clone(),
            turn.user_turn.attachments.clone(),
        );
        self.run_stream(turn_id.clone(), request, true, Some(snapshot))
            .await
    }

    /// Pass text through to the clipboard collaborator.
    pub async fn handle_copy(&self, text: &str) -> Result<()> {
        self.clipboard.write(text).await.map_err(|reason| {
            tracing::warn!(%reason, "clipboard write failed");
            Error::Clipboard(reason)
        })
    }

    /// Collapse the eligible prefix of history into a summary entry.
    ///
    /// The size signal that decides *when* to compact belongs to the caller;
    /// this runs one compaction over whatever is currently eligible.
    pub async fn compact(&mut self) -> Result<CompactionOutcome> {
        self.emit(SessionEvent::CompactionStarted);
        self.handle.set_running(true);
        let result = self
            .compaction
            .run(&mut self.store, &self.streaming, &self.summarizer)
            .await;
        self.handle.set_running(false);
        match &result {
            Ok(outcome) => self.emit(SessionEvent::CompactionCompleted {
                turns_before: outcome.turns_before,
                turns_after: outcome.turns_after,
            }),
            Err(e) => self.emit(SessionEvent::CompactionFailed {
                reason: e.to_string(),
            }),
        }
        result
    }

    /// Drop all turns, the archive, and any pending question flow.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(active) = self.streaming.active_turn() {
            return Err(Error::ConcurrentStream {
                active: active.clone(),
            });
        }
        self.store.clear();
        self.pending_question = None;
        self.last_error = None;
        Ok(())
    }

    // ---- Pending-question flow ----

    /// Start a structured-question flow over a validated question set.
    pub fn begin_questions(&mut self, questions: Vec<Question>) -> Result<()> {
        if self.pending_question.is_some() {
            return Err(Error::Question("a question flow is already active".into()));
        }
        self.pending_question = Some(PendingQuestion::new(questions)?);
        self.emit(SessionEvent::QuestionsStarted);
        Ok(())
    }

    pub fn toggle_question_option(&mut self, question_id: &str, option_id: &str) -> Result<()> {
        self.pending_mut()?.toggle_option(question_id, option_id)
    }

    pub fn set_question_custom_text(
        &mut self,
        question_id: &str,
        text: Option<String>,
    ) -> Result<()> {
        self.pending_mut()?.set_custom_text(question_id, text)
    }

    pub fn begin_question_confirmation(&mut self) -> Result<()> {
        self.pending_mut()?.begin_confirmation()
    }

    pub fn reopen_questions(&mut self) -> Result<()> {
        self.pending_mut()?.reopen();
        Ok(())
    }

    /// Commit the confirmed answers as one user turn and stream the response.
    pub async fn confirm_questions(&mut self) -> Result<TurnId> {
        let pending = self
            .pending_question
            .take()
            .ok_or_else(|| Error::Question("no pending question".into()))?;
        if pending.phase() != QuestionPhase::Confirming {
            self.pending_question = Some(pending);
            return Err(Error::Question("confirmation step not reached".into()));
        }

        let content = pending.render_content();
        let (turn_id, request) = self.append_user_turn(content, vec![])?;
        self.emit(SessionEvent::QuestionsCommitted {
            turn_id: turn_id.clone(),
        });
        self.run_stream(turn_id.clone(), request, false, None).await?;
        Ok(turn_id)
    }

    /// Discard all in-progress answers. No effect on the turn store.
    pub fn cancel_questions(&mut self) {
        if self.pending_question.take().is_some() {
            self.emit(SessionEvent::QuestionsCancelled);
        }
    }

    // ---- Internals ----

    fn append_user_turn(
        &mut self,
        content: String,
        attachments: Vec<Attachment>,
    ) -> Result<(TurnId, TransportRequest)> {
        if let Some(active) = self.streaming.active_turn() {
            return Err(Error::ConcurrentStream {
                active: active.clone(),
            });
        }
        let request = TransportRequest::new(content.clone(), attachments.clone());
        let turn_id = self.store.append(UserTurn::new(content, attachments));
        self.emit(SessionEvent::TurnAppended {
            turn_id: turn_id.clone(),
        });
        Ok((turn_id, request))
    }

    async fn run_stream(
        &mut self,
        turn_id: TurnId,
        request: TransportRequest,
        regeneration: bool,
        snapshot: Option<Snapshot>,
    ) -> Result<()> {
        self.streaming.begin(turn_id.clone(), regeneration)?;
        self.last_error = None;
        self.handle.set_running(true);
        self.emit(SessionEvent::StreamStarted {
            turn_id: turn_id.clone(),
            regeneration,
        });

        let result = self.drive_stream(turn_id, request, snapshot).await;
        self.handle.set_running(false);
        result
    }

    async fn drive_stream(
        &mut self,
        turn_id: TurnId,
        request: TransportRequest,
        snapshot: Option<Snapshot>,
    ) -> Result<()> {
        let cancel = self.handle.reset_cancel();
        let transport = Arc::clone(&self.transport);

        let outcome = match transport.send(request, cancel.clone()).await {
            Ok(mut stream) => {
                let mut outcome = None;
                while let Some(event) = stream.next().await {
                    if cancel.is_cancelled() {
                        outcome = Some(StreamOutcome::Cancelled);
                        break;
                    }
                    match event {
                        TransportEvent::Chunk { text } => {
                            self.streaming.append_chunk(&text)?;
                            self.emit(SessionEvent::StreamDelta {
                                turn_id: turn_id.clone(),
                                text,
                            });
                        }
                        TransportEvent::Completed(meta) => {
                            outcome = Some(StreamOutcome::Completed(meta));
                        }
                        TransportEvent::Failed { reason } => {
                            outcome = Some(StreamOutcome::Failed(reason));
                        }
                    }
                }
                outcome.unwrap_or_else(|| {
                    if cancel.is_cancelled() {
                        StreamOutcome::Cancelled
                    } else {
                        StreamOutcome::Failed("transport stream ended without completion".into())
                    }
                })
            }
            Err(e) => {
                let reason = match e {
                    Error::Transport { reason, .. } => reason,
                    other => other.to_string(),
                };
                StreamOutcome::Failed(reason)
            }
        };

        match outcome {
            StreamOutcome::Completed(meta) => {
                self.streaming.complete(&mut self.store, meta)?;
                self.emit(SessionEvent::StreamCompleted { turn_id });
                Ok(())
            }
            StreamOutcome::Failed(reason) => {
                let failure = self.streaming.fail(&mut self.store, &reason)?;
                self.last_error = Some(reason.clone());
                self.emit(SessionEvent::StreamErrored {
                    turn_id: turn_id.clone(),
                    reason: reason.clone(),
                });
                if failure.regeneration {
                    if let Some(snapshot) = snapshot {
                        regenerate::restore(&mut self.store, snapshot)?;
                    }
                    self.emit(SessionEvent::RegenerationRestored {
                        turn_id,
                        reason: reason.clone(),
                    });
                    Err(Error::Regeneration { reason })
                } else {
                    let partial = (!failure.partial.is_empty()).then_some(failure.partial);
                    Err(Error::Transport { reason, partial })
                }
            }
            StreamOutcome::Cancelled => {
                let failure = self.streaming.cancel(&mut self.store);
                self.last_error = Some("cancelled".into());
                self.emit(SessionEvent::StreamCancelled {
                    turn_id: turn_id.clone(),
                });
                if let Some(failure) = &failure {
                    if failure.regeneration {
                        if let Some(snapshot) = snapshot {
                            regenerate::restore(&mut self.store, snapshot)?;
                        }
                        self.emit(SessionEvent::RegenerationRestored {
                            turn_id,
                            reason: "cancelled".into(),
                        });
                        return Err(Error::Regeneration {
                            reason: "cancelled".into(),
                        });
                    }
                }
                let partial = failure
                    .map(|f| f.partial)
                    .filter(|p| !p.is_empty());
                Err(Error::Transport {
                    reason: "cancelled".into(),
                    partial,
                })
            }
        }
    }

    fn pending_mut(&mut self) -> Result<&mut PendingQuestion> {
        self.pending_question
            .as_mut()
            .ok_or_else(|| Error::Question("no pending question".into()))
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}
