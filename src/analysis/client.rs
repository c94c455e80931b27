use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Transport(String),
    #[error("LLM API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("LLM API key is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    /// Sends a single user prompt and returns the model's text reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct AnthropicClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessageResponse {
    fn first_text(self) -> String {
        self.content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .unwrap_or_default()
    }
}

impl AnthropicClient {
    pub fn new(http: Client, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(http, api_key, model, ANTHROPIC_API_BASE)
    }

    pub fn with_base_url(
        http: Client,
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::NotConfigured)?;
        let body = MessageRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "anthropic request rejected");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        let parsed: MessageResponse = response
            .json()
            .await
            .map_err(|err| LlmError::Transport(err.to_string()))?;
        Ok(parsed.first_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_text_block() {
        let response: MessageResponse = serde_json::from_str(
            r#"{"content":[{"type":"tool_use","id":"x"},{"type":"text","text":"[]"},{"type":"text","text":"later"}]}"#,
        )
        .unwrap();
        assert_eq!(response.first_text(), "[]");
    }

    #[test]
    fn request_body_shape() {
        let body = MessageRequest {
            model: "m",
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: [Message {
                role: "user",
                content: "hi",
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["max_tokens"], 4000);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let client = AnthropicClient::new(Client::new(), None, "m");
        assert!(matches!(
            client.complete("prompt").await,
            Err(LlmError::NotConfigured)
        ));
    }
}
