//! A fake [`SessionBacking`] for exercising [`stepforge_session`]
//! without a real LLM collaborator underneath it.

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use stepforge_session::{BackingResponse, SessionBacking};
use stepforge_types::StepForgeError;

/// Echoes its prompt back as the response content, recording every
/// prompt it was asked to respond to.
#[derive(Debug, Default)]
pub struct EchoSession {
    prompts: Mutex<Vec<String>>,
}

impl EchoSession {
    /// Create a fresh, empty-history echo session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The prompts seen so far, oldest first.
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl SessionBacking for EchoSession {
    async fn respond(&self, prompt: &str) -> Result<BackingResponse, StepForgeError> {
        self.prompts.lock().await.push(prompt.to_string());
        Ok(BackingResponse {
            content: prompt.to_string(),
            raw_content: json!({ "echoed": prompt }),
            transcript_entries: vec![json!({ "role": "user", "content": prompt })],
        })
    }
}
