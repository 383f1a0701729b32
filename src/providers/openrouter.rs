//! OpenRouter provider adapter.
//!
//! Routes calls through OpenRouter's unified, OpenAI-compatible API,
//! giving access to Gemini, Llama, DeepSeek, and Mistral models with a
//! single API key. Reuses the chat completion wire types from the
//! OpenAI adapter.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::openai::{ChatRequest, ChatResponse};
use super::{map_status_error, map_transport_error, ModelProvider, ProviderFailure};

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterProvider {
    id: String,
    http: Client,
    api_key: String,
    /// Fully-qualified OpenRouter model id, e.g.
    /// "meta-llama/llama-3.1-405b-instruct".
    model: String,
}

impl OpenRouterProvider {
    pub fn new(id: &str, api_key: String, model: String) -> anyhow::Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build OpenRouter HTTP client: {e}"))?;

        Ok(Self {
            id: id.to_string(),
            http,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn query(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderFailure> {
        let request = ChatRequest::single_user(&self.model, prompt);

        debug!(provider = %self.id, model = %self.model, "Querying OpenRouter");

        let response = self
            .http
            .post(OPENROUTER_API_URL)
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
    fn test_construction() {
        let p = OpenRouterProvider::new(
            "llama-405b",
            "key".to_string(),
            "meta-llama/llama-3.1-405b-instruct".to_string(),
        )
        .unwrap();
        assert_eq!(p.id(), "llama-405b");
        assert_eq!(p.model, "meta-llama/llama-3.1-405b-instruct");
    }
}
