//! Completion provider trait for structured extraction.
//!
//! Abstracts the backends that can turn a prompt pair into a JSON
//! object: a deterministic native heuristic for local development and
//! tests, or a hosted OpenAI-compatible chat API.

use async_trait::async_trait;

use crate::error::Result;

/// Contract for completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run the prompt pair and return the parsed JSON object the model
    /// answered with.
    async fn complete_json(&self, system: &str, user: &str) -> Result<serde_json::Value>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
