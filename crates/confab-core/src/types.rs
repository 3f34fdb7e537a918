//! Core types for conversation turn history

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Identifier for a conversation turn.
///
/// Generated by the turn store; unique for the session lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    /// Generate a fresh id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TurnId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TurnId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Current epoch-millis timestamp.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Payload of an attachment: either inline base64 data or a remote reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentData {
    /// Inline content, base64 encoded
    Inline { base64: String },
    /// Content stored elsewhere, addressed by URL
    Remote { url: String },
}

/// A file attached to a user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub data: AttachmentData,
}

impl Attachment {
    /// Create an inline attachment from raw bytes.
    pub fn inline(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            data: AttachmentData::Inline {
                base64: BASE64.encode(bytes),
            },
        }
    }

    /// Create an attachment referencing remote content.
    pub fn remote(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
        url: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            size_bytes,
            data: AttachmentData::Remote { url: url.into() },
        }
    }

    /// Decode the inline payload. `None` for remote attachments.
    pub fn decode(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match &self.data {
            AttachmentData::Inline { base64 } => Some(BASE64.decode(base64)),
            AttachmentData::Remote { .. } => None,
        }
    }
}

/// A reference cited by an assistant response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub url: String,
    pub start_index: usize,
    pub end_index: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

/// A generated artifact attached to an assistant response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub mime_type: String,
    pub url: String,
    pub size_bytes: u64,
    pub created_at: i64,
}

/// Token usage recorded for one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    #[serde(default)]
    pub cached_tokens: u32,
    #[serde(default)]
    pub cost: f64,
}

/// One tool invocation recorded in a debug trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallTrace {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
}

/// Diagnostic payload attached to an assistant response.
///
/// Read-only after creation; never mutated by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugTrace {
    pub generation_ms: i64,
    pub usage: DebugUsage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolCallTrace>,
}

/// Role of an assistant-side turn entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantRole {
    /// A model-generated response
    Assistant,
    /// An engine-generated entry, e.g. a compaction summary
    System,
}

/// Lifecycle status of an assistant response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantStatus {
    Streaming,
    Complete,
    Errored,
}

/// The user half of a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTurn {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub created_at: i64,
}

impl UserTurn {
    /// Create a user turn stamped with the current time.
    pub fn new(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            content: content.into(),
            attachments,
            created_at: now_millis(),
        }
    }
}

/// The assistant half of a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantTurn {
    pub role: AssistantRole,
    pub content: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
    pub status: AssistantStatus,
}

impl AssistantTurn {
    /// Create an assistant turn with the given status.
    pub fn new(role: AssistantRole, content: impl Into<String>, status: AssistantStatus) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: now_millis(),
            sources: vec![],
            artifacts: vec![],
            debug: None,
            status,
        }
    }

    /// A completed model response.
    pub fn complete(content: impl Into<String>) -> Self {
        Self::new(AssistantRole::Assistant, content, AssistantStatus::Complete)
    }

    /// A failed model response, keeping whatever partial content accumulated.
    pub fn errored(content: impl Into<String>) -> Self {
        Self::new(AssistantRole::Assistant, content, AssistantStatus::Errored)
    }

    /// An engine-generated system entry (e.g. a compaction summary).
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(AssistantRole::System, content, AssistantStatus::Complete)
    }

    /// Attach citations.
    pub fn with_sources(mut self, sources: Vec<Citation>) -> Self {
        self.sources = sources;
        self
    }

    /// Attach artifacts.
    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Attach a debug trace.
    pub fn with_debug(mut self, debug: DebugTrace) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Whether this response reached a terminal state.
    pub fn is_final(&self) -> bool {
        matches!(
            self.status,
            AssistantStatus::Complete | AssistantStatus::Errored
        )
    }
}

/// One user message paired with at most one assistant response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub user_turn: UserTurn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_turn: Option<AssistantTurn>,
    pub created_at: i64,
}

impl ConversationTurn {
    /// Create a turn from a user message, with no assistant response yet.
    pub fn new(id: TurnId, user_turn: UserTurn) -> Self {
        let created_at = user_turn.created_at;
        Self {
            id,
            user_turn,
            assistant_turn: None,
            created_at,
        }
    }
}

/// Record of a compaction: the summary text and the turns it covers.
///
/// The covered turns are retained by the store's archive; the summary entry
/// takes their place in the live history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSummary {
    pub text: String,
    pub covered_turn_ids: Vec<TurnId>,
    pub summary_turn_id: TurnId,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_ids_unique() {
        let a = TurnId::generate();
        let b = TurnId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_attachment_inline_round_trip() {
        let bytes = b"report contents";
        let att = Attachment::inline("report.csv", "text/csv", bytes);
        assert_eq!(att.size_bytes, bytes.len() as u64);
        let decoded = att.decode().expect("inline").expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_attachment_remote_has_no_payload() {
        let att = Attachment::remote("big.pdf", "application/pdf", 1 << 20, "https://x/big.pdf");
        assert!(att.decode().is_none());
    }

    #[test]
    fn test_assistant_turn_final_states() {
        assert!(AssistantTurn::complete("done").is_final());
        assert!(AssistantTurn::errored("partial").is_final());
        let streaming =
            AssistantTurn::new(AssistantRole::Assistant, "", AssistantStatus::Streaming);
        assert!(!streaming.is_final());
    }

    #[test]
    fn test_system_entry_role() {
        let summary = AssistantTurn::system("earlier conversation condensed");
        assert_eq!(summary.role, AssistantRole::System);
        assert_eq!(summary.status, AssistantStatus::Complete);
    }

    #[test]
    fn test_turn_serde_round_trip() {
        let turn = ConversationTurn::new(TurnId::generate(), UserTurn::new("hi", vec![]));
        let json = serde_json::to_string(&turn).unwrap();
        let back: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
