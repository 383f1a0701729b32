//! OpenAI provider adapter.
//!
//! Implements `ModelProvider` against the OpenAI chat completions API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{map_status_error, map_transport_error, ModelProvider, ProviderFailure};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f64 = 0.7;

// ---------------------------------------------------------------------------
// API types (shared with the OpenRouter adapter — same wire format)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    pub content: String,
}

impl ChatRequest {
    pub(crate) fn single_user(model: &str, prompt: &str) -> Self {
        ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ChatResponse {
    /// First choice's content, or a typed failure when absent.
    pub(crate) fn into_text(mut self) -> Result<String, ProviderFailure> {
        if self.choices.is_empty() {
            return Err(ProviderFailure::Provider("no choices in response".to_string()));
        }
        let text = std::mem::take(&mut self.choices[0].message.content);
        if text.is_empty() {
            Err(ProviderFailure::Provider("empty response".to_string()))
        } else {
            Ok(text)
        }
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct OpenAiProvider {
    id: String,
    http: Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(id: &str, api_key: String, model: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build OpenAI HTTP client: {e}"))?;

        Ok(Self {
            id: id.to_string(),
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn query(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderFailure> {
        let request = ChatRequest::single_user(&self.model, prompt);

        debug!(provider = %self.id, model = %self.model, "Querying OpenAI");

        let response = self
            .http
            .post(OPENAI_API_URL)
            .timeout(timeout)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Provider(format!("invalid response body: {e}")))?;

        body.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_defaults() {
        let p = OpenAiProvider::new("gpt-4o", "key".to_string(), None).unwrap();
        assert_eq!(p.id(), "gpt-4o");
        assert_eq!(p.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_chat_request_shape() {
        let request = ChatRequest::single_user("gpt-4o", "Analyze this");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["messages"][0]["content"], "Analyze this");
        assert_eq!(json["max_tokens"], 500);
    }

    #[test]
    fn test_chat_response_into_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"ACTION: SKIP"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "ACTION: SKIP");
    }

    #[test]
    fn test_chat_response_no_choices() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            parsed.into_text(),
            Err(ProviderFailure::Provider(_))
        ));
    }
}
