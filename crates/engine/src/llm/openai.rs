use async_trait::async_trait;
use serde_json::{json, Value};

use super::{api_error_message, LlmClient, LlmError, Message, ModelResponse};
use crate::config::ModelConfig;

/// Client for an OpenAI-compatible chat completions API.
///
/// Uses `ureq` (blocking) on the blocking thread pool. Requests JSON-object
/// output so the completion text is a single object.
pub struct OpenAiClient {
    agent: ureq::Agent,
    config: ModelConfig,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(config.timeout))
                .http_status_as_error(false)
                .build(),
        );
        Self { agent, config }
    }

    fn request_body(&self, messages: &[Message], model: &str) -> Value {
        json!({
            "model": model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        model: &str,
    ) -> Result<ModelResponse, LlmError> {
        let agent = self.agent.clone();
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let authorization = format!("Bearer {}", self.config.api_key);
        let body = self.request_body(&messages, model);

        tracing::debug!(%url, model, "sending chat completion request");

        let envelope: Value = tokio::task::spawn_blocking(move || {
            let mut response = agent
                .post(&url)
                .header("Authorization", &authorization)
                .header("content-type", "application/json")
                .send_json(body)
                .map_err(|e| LlmError::NetworkError(e.to_string()))?;

            let status = response.status().as_u16();
            if status >= 400 {
                let text = response.body_mut().read_to_string().unwrap_or_default();
                return Err(LlmError::ApiError {
                    status,
                    message: api_error_message(&text),
                });
            }
            response.body_mut().read_json::<Value>().map_err(|e| {
                LlmError::ParseError(format!("failed to read chat completion response: {}", e))
            })
        })
        .await
        .map_err(|e| LlmError::NetworkError(format!("task join error: {}", e)))??;

        completion_text(&envelope).map(ModelResponse::Text)
    }
}

/// `choices[0].message.content` of a chat completion envelope.
fn completion_text(envelope: &Value) -> Result<String, LlmError> {
    envelope["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::ParseError("no message content in chat completion".to_string()))
}
