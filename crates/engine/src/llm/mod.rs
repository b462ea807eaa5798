//! The language-model capability: `LlmClient` trait and its clients.
//!
//! The engine only needs "prompt in, response out" from a model. The HTTP
//! clients are feature-gated; [`OfflineClient`] is always available.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "anthropic")]
mod anthropic;
mod offline;
#[cfg(feature = "openai")]
mod openai;

pub use offline::OfflineClient;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicClient;
#[cfg(feature = "openai")]
pub use openai::OpenAiClient;

/// Error type for model client operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Network or HTTP transport error.
    #[error("model network error: {0}")]
    NetworkError(String),
    /// The model API returned an error response.
    #[error("model API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    /// The API response envelope could not be read.
    #[error("model parse error: {0}")]
    ParseError(String),
}

/// A message in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// What a model call hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// Already-parsed structured output.
    Structured(serde_json::Value),
    /// Raw completion text, expected to contain a JSON object.
    Text(String),
}

/// Trait for calling a language model.
///
/// Implementations handle the specifics of one API; the engine handles
/// prompt construction and response parsing. Implementations must be safe
/// to call concurrently.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages to the model and get its response.
    async fn complete(&self, messages: Vec<Message>, model: &str)
        -> Result<ModelResponse, LlmError>;

    /// Whether dropping an in-flight `complete` future actually stops the
    /// call. When false, a cancelled translation waits for the call to
    /// finish so its outcome can be recorded.
    fn abort_safe(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    async fn complete(
        &self,
        messages: Vec<Message>,
        model: &str,
    ) -> Result<ModelResponse, LlmError> {
        (**self).complete(messages, model).await
    }

    fn abort_safe(&self) -> bool {
        (**self).abort_safe()
    }
}

/// Pull a short message out of a provider error body, falling back to the
/// raw text.
#[cfg(any(feature = "openai", feature = "anthropic"))]
pub(crate) fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
