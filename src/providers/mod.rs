//! Provider adapters — boundary shims over external AI backends.
//!
//! Defines the `ModelProvider` capability and provides implementations
//! for Claude (Anthropic), GPT-4o (OpenAI), and OpenRouter-hosted models
//! (Gemini, Llama, DeepSeek, Mistral). Adapters carry no business logic:
//! they send one prompt and return raw text or a typed failure.

pub mod anthropic;
pub mod openai;
pub mod openrouter;

use async_trait::async_trait;
use std::time::Duration;

/// How a single provider call can fail. All variants are recovered by
/// the dispatcher: the provider is excluded from aggregation and the
/// request continues.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("provider error: {0}")]
    Provider(String),
}

/// Abstraction over one external AI backend.
///
/// Implementors send the analysis prompt and return the model's raw
/// reply text within the given timeout.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Opaque provider identifier (e.g. "claude-opus"), used for
    /// weighting, dissent reporting, and prediction records.
    fn id(&self) -> &str;

    /// Send one prompt and return the raw reply text.
    async fn query(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderFailure>;
}

/// Map a reqwest transport error to a provider failure.
pub(crate) fn map_transport_error(e: reqwest::Error) -> ProviderFailure {
    if e.is_timeout() {
        ProviderFailure::Timeout
    } else {
        ProviderFailure::Provider(format!("request error: {e}"))
    }
}

/// Map a non-success HTTP status plus body to a provider failure.
pub(crate) fn map_status_error(status: reqwest::StatusCode, body: &str) -> ProviderFailure {
    if status.as_u16() == 429 {
        ProviderFailure::RateLimited
    } else {
        ProviderFailure::Provider(format!("HTTP {status}: {body}"))
    }
}
