//! Anthropic Claude provider adapter.
//!
//! Implements `ModelProvider` against the Anthropic Messages API.
//! Text is concatenated from the response content blocks; no retries
//! inside a request (a failed provider is simply excluded upstream).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{map_status_error, map_transport_error, ModelProvider, ProviderFailure};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const DEFAULT_MAX_TOKENS: u32 = 500;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct AnthropicProvider {
    id: String,
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(id: &str, api_key: String, model: Option<String>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build Anthropic HTTP client: {e}"))?;

        Ok(Self {
            id: id.to_string(),
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn query(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderFailure> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(provider = %self.id, model = %self.model, "Querying Anthropic");

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .timeout(timeout)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Provider(format!("invalid response body: {e}")))?;

        let text = body
            .content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderFailure::Provider("empty response".to_string()));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_defaults() {
        let p = AnthropicProvider::new("claude-opus", "key".to_string(), None).unwrap();
        assert_eq!(p.id(), "claude-opus");
        assert_eq!(p.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_construction_custom_model() {
        let p = AnthropicProvider::new(
            "claude-sonnet",
            "key".to_string(),
            Some("claude-sonnet-4-20250514".to_string()),
        )
        .unwrap();
        assert_eq!(p.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude-3-opus-20240229".to_string(),
            max_tokens: 500,
            messages: vec![Message {
                role: "user".to_string(),
                content: "Analyze this".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "claude-3-opus-20240229");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_response_deserialization() {
        let body = r#"{"content":[{"type":"text","text":"ACTION: HOLD"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.content[0].text.as_deref(), Some("ACTION: HOLD"));
    }
}
