//! Clipboard collaborator

use async_trait::async_trait;

/// System clipboard the facade's `handle_copy` passes through to.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write(&self, text: &str) -> Result<(), String>;
}
