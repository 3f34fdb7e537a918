//! confab-core: Data model for chat conversation state
//!
//! This crate holds the turn history data model shared by the session engine
//! and its consumers: conversation turns, attachments, citations, artifacts,
//! debug traces, compaction summaries, and structured questions.

pub mod question;
pub mod types;

pub use question::{Answer, Question, QuestionOption};
pub use types::{
    Artifact, AssistantRole, AssistantStatus, AssistantTurn, Attachment, AttachmentData, Citation,
    CompactionSummary, ConversationTurn, DebugTrace, DebugUsage, ToolCallTrace, TurnId, UserTurn,
};
