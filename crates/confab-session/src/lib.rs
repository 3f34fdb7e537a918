//! confab-session: Conversation state engine
//!
//! This crate provides the state engine behind a chat-style assistant
//! interface: the ordered turn history, the single in-flight response stream,
//! regeneration with rollback, mid-session context compaction, and the
//! structured-question flow, composed behind one session facade.

pub mod clipboard;
pub mod compaction;
pub mod error;
pub mod events;
pub mod handle;
pub mod question;
pub mod regenerate;
pub mod session;
pub mod store;
pub mod streaming;
pub mod transport;

pub use clipboard::Clipboard;
pub use compaction::{CompactionConfig, CompactionCoordinator, CompactionOutcome, Summarizer};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use handle::SessionHandle;
pub use question::{PendingQuestion, QuestionPhase, validate_questions};
pub use session::{ChatSession, SessionConfig};
pub use store::{AssistantUpdate, TurnStore};
pub use streaming::{FinishedStream, StreamController, StreamFailure};
pub use transport::{ResponseMeta, Transport, TransportEvent, TransportRequest, TransportStream};
