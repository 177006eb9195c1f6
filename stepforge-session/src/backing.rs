//! The LLM-session protocol the core consumes: a collaborator exposing
//! `respond(prompt) -> {content, entries}`. The core does not model
//! the wire protocol underneath it.

use async_trait::async_trait;
use serde_json::Value;

use stepforge_types::StepForgeError;

/// One completed exchange with the underlying LLM session.
#[derive(Debug, Clone)]
pub struct BackingResponse {
    /// The assistant's rendered text content.
    pub content: String,
    /// The raw, provider-shaped response payload.
    pub raw_content: Value,
    /// Transcript entries the backing wants recorded (e.g. one per
    /// message exchanged), opaque to the session manager.
    pub transcript_entries: Vec<Value>,
}

/// A swappable conversation backend, held as `Arc<dyn SessionBacking>`
/// so [`crate::manager::SessionManager::replace_session`] can move a
/// session to a differently-implemented backing at runtime without
/// losing its turn queue or steering buffer.
#[async_trait]
pub trait SessionBacking: Send + Sync {
    /// Respond to `prompt`, the fully-assembled user content for this
    /// turn (steering fragments already prepended).
    async fn respond(&self, prompt: &str) -> Result<BackingResponse, StepForgeError>;
}
