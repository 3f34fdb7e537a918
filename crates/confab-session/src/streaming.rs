//! Streaming controller: lifecycle of the single in-flight assistant response
//!
//! States: `Idle -> Streaming -> {Complete, Errored, Cancelled} -> Idle`.
//! Chunks accumulate in a controller-owned buffer and only reach the turn
//! store at finalization, so consumers never observe a half-written response
//! as committed.

use confab_core::{AssistantTurn, TurnId};

use crate::error::{Error, Result};
use crate::store::TurnStore;
use crate::transport::ResponseMeta;

#[derive(Debug, Default)]
enum StreamState {
    #[default]
    Idle,
    Streaming {
        turn_id: TurnId,
        buffer: String,
        regeneration: bool,
    },
}

/// Outcome of a successfully finalized stream.
#[derive(Debug, Clone)]
pub struct FinishedStream {
    pub turn_id: TurnId,
    pub content: String,
    pub regeneration: bool,
}

/// Outcome of a failed or cancelled stream, carrying the partial content.
#[derive(Debug, Clone)]
pub struct StreamFailure {
    pub turn_id: TurnId,
    pub partial: String,
    pub regeneration: bool,
}

/// Owns the single active response stream for a session.
#[derive(Debug, Default)]
pub struct StreamController {
    state: StreamState,
    generation: u64,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, StreamState::Streaming { .. })
    }

    /// The accumulated buffer of the active stream.
    pub fn streaming_content(&self) -> Option<&str> {
        match &self.state {
            StreamState::Streaming { buffer, .. } => Some(buffer),
            StreamState::Idle => None,
        }
    }

    /// The turn the active stream is producing a response for.
    pub fn active_turn(&self) -> Option<&TurnId> {
        match &self.state {
            StreamState::Streaming { turn_id, .. } => Some(turn_id),
            StreamState::Idle => None,
        }
    }

    /// Stream generation counter; bumped on every accepted `begin`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a stream for the given turn.
    ///
    /// Rejected with `ConcurrentStream` while a stream is active for a
    /// different turn. Re-beginning on the same turn is permitted only when
    /// both the active and the requested stream are regenerations; the stale
    /// buffer is dropped and a new generation starts.
    pub fn begin(&mut self, turn_id: TurnId, regeneration: bool) -> Result<()> {
        if let StreamState::Streaming {
            turn_id: active,
            regeneration: active_regen,
            ..
        } = &self.state
        {
            let same_turn_regen = *active == turn_id && *active_regen && regeneration;
            if !same_turn_regen {
                tracing::error!(
                    active = %active,
                    requested = %turn_id,
                    "begin rejected: a stream is already active"
                );
                return Err(Error::ConcurrentStream {
                    active: active.clone(),
                });
            }
        }
        self.generation += 1;
        self.state = StreamState::Streaming {
            turn_id,
            buffer: String::new(),
            regeneration,
        };
        Ok(())
    }

    /// Append an increment of assistant text. The buffer only ever grows
    /// within a stream generation.
    pub fn append_chunk(&mut self, text: &str) -> Result<()> {
        match &mut self.state {
            StreamState::Streaming { buffer, .. } => {
                buffer.push_str(text);
                Ok(())
            }
            StreamState::Idle => Err(Error::InvalidTransition(
                "append_chunk with no active stream".into(),
            )),
        }
    }

    /// Finalize the active stream successfully: the accumulated content and
    /// the transport's response metadata land on the turn with status
    /// `Complete`.
    pub fn complete(&mut self, store: &mut TurnStore, meta: ResponseMeta) -> Result<FinishedStream> {
        let (turn_id, buffer, regeneration) = self.take_active("complete")?;

        let mut assistant = AssistantTurn::complete(buffer.clone())
            .with_sources(meta.sources)
            .with_artifacts(meta.artifacts);
        if let Some(debug) = meta.debug {
            assistant = assistant.with_debug(debug);
        }

        if regeneration {
            store.replace_assistant(&turn_id, assistant, true)?;
        } else {
            store.attach_assistant(&turn_id, assistant)?;
        }

        Ok(FinishedStream {
            turn_id,
            content: buffer,
            regeneration,
        })
    }

    /// Finalize the active stream as failed.
    ///
    /// For a fresh turn the partial content lands on the turn with status
    /// `Errored`. For a regeneration the store is left to the regeneration
    /// coordinator, which restores the previous answer.
    pub fn fail(&mut self, store: &mut TurnStore, reason: &str) -> Result<StreamFailure> {
        let (turn_id, buffer, regeneration) = self.take_active("fail")?;
        tracing::warn!(turn = %turn_id, reason, "stream failed");

        if !regeneration {
            store.attach_assistant(&turn_id, AssistantTurn::errored(buffer.clone()))?;
        }

        Ok(StreamFailure {
            turn_id,
            partial: buffer,
            regeneration,
        })
    }

    /// Cancel the active stream. Safe to call from any state and idempotent:
    /// returns `None` when no stream is active. A cancelled fresh stream
    /// keeps its partial content on the turn with status `Errored`.
    pub fn cancel(&mut self, store: &mut TurnStore) -> Option<StreamFailure> {
        let (turn_id, buffer, regeneration) = match std::mem::take(&mut self.state) {
            StreamState::Idle => return None,
            StreamState::Streaming {
                turn_id,
                buffer,
                regeneration,
            } => (turn_id, buffer, regeneration),
        };

        if !regeneration {
            if let Err(e) =
                store.attach_assistant(&turn_id, AssistantTurn::errored(buffer.clone()))
            {
                tracing::warn!(turn = %turn_id, error = %e, "could not preserve cancelled partial");
            }
        }

        Some(StreamFailure {
            turn_id,
            partial: buffer,
            regeneration,
        })
    }

    fn take_active(&mut self, op: &str) -> Result<(TurnId, String, bool)> {
        match std::mem::take(&mut self.state) {
            StreamState::Streaming {
                turn_id,
                buffer,
                regeneration,
            } => Ok((turn_id, buffer, regeneration)),
            StreamState::Idle => Err(Error::InvalidTransition(format!(
                "{op} with no active stream"
            ))),
        }
    }
}
