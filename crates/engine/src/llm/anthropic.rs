use async_trait::async_trait;
use serde_json::{json, Value};

use super::{api_error_message, LlmClient, LlmError, Message, ModelResponse};
use crate::config::ModelConfig;

const API_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    agent: ureq::Agent,
    config: ModelConfig,
}

impl AnthropicClient {
    pub fn new(config: ModelConfig) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::Agent::config_builder()
                .timeout_global(Some(config.timeout))
                .http_status_as_error(false)
                .build(),
        );
        Self { agent, config }
    }

    /// The Messages API takes the system prompt as a separate field.
    fn request_body(&self, messages: &[Message], model: &str) -> Value {
        let system = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let turns: Vec<&Message> = messages.iter().filter(|m| m.role != "system").collect();

        let mut body = json!({
            "model": model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system);
        }
        body
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        model: &str,
    ) -> Result<ModelResponse, LlmError> {
        let agent = self.agent.clone();
        let url = format!("{}/v1/messages", self.config.base_url());
        let api_key = self.config.api_key.clone();
        let body = self.request_body(&messages, model);

        tracing::debug!(%url, model, "sending messages request");

        let envelope: Value = tokio::task::spawn_blocking(move || {
            let mut response = agent
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", API_VERSION)
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
                LlmError::ParseError(format!("failed to read Anthropic response: {}", e))
            })
        })
        .await
        .map_err(|e| LlmError::NetworkError(format!("task join error: {}", e)))??;

        // Extract content[0].text
        envelope["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .and_then(|block| block["text"].as_str())
            .map(|text| ModelResponse::Text(text.to_string()))
            .ok_or_else(|| LlmError::ParseError("no text content in Anthropic response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;

    #[test]
    fn system_prompt_moves_to_its_own_field() {
        let client = AnthropicClient::new(ModelConfig::new(Provider::Anthropic, "k"));
        let messages = vec![
            Message {
                role: "system".to_string(),
                content: "rules".to_string(),
            },
            Message {
                role: "user".to_string(),
                content: "text".to_string(),
            },
        ];
        let body = client.request_body(&messages, "claude-3-haiku");
        assert_eq!(body["system"], "rules");
        let turns = body["messages"].as_array().unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0]["role"], "user");
    }
}
