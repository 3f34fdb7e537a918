//! Transport abstraction: the collaborator that performs model inference
//!
//! The engine treats the transport purely as an event source: a request goes
//! out, a stream of chunk/completed/failed events comes back. Retry and
//! backoff live inside transport implementations, not here.

use std::pin::Pin;

use async_trait::async_trait;
use confab_core::{Artifact, Attachment, Citation, DebugTrace};
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A request for one assistant response.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl TransportRequest {
    pub fn new(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            content: content.into(),
            attachments,
        }
    }
}

/// Metadata delivered when the transport completes a response.
///
/// The response text itself arrives as chunks; this carries everything else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

/// Events emitted by an in-flight transport stream.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An increment of assistant text
    Chunk { text: String },
    /// The response finished; final text is the concatenation of all chunks
    Completed(ResponseMeta),
    /// The response failed; any chunks received so far are the partial content
    Failed { reason: String },
}

/// A stream of transport events.
pub type TransportStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Transport for obtaining assistant responses.
///
/// Cancellation is cooperative: implementations should stop producing events
/// once `cancel` fires, but the engine transitions immediately either way.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> Result<TransportStream>;
}
