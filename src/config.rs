//! TOML configuration.
//!
//! Providers are listed in priority order: tier selection takes the
//! first N enabled entries, so the strongest models belong at the top.
//! API keys are never stored in the file — each entry names the
//! environment variable that holds its key.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::engine::dispatch::DispatchConfig;

// ---------------------------------------------------------------------------
// Provider entries
// ---------------------------------------------------------------------------

/// Which adapter an entry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    OpenRouter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    /// Backend model name. Optional for Anthropic/OpenAI (adapter
    /// defaults apply); required for OpenRouter.
    pub model: Option<String>,
    /// Environment variable holding this provider's API key.
    pub api_key_env: String,
    #[serde(default = "default_base_weight")]
    pub base_weight: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_base_weight() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default = "default_global_deadline_ms")]
    pub global_deadline_ms: u64,
    #[serde(default = "default_quorum")]
    pub quorum: usize,
    /// Interval between weight recomputes from stored records.
    #[serde(default = "default_weight_recompute_secs")]
    pub weight_recompute_secs: u64,
}

fn default_provider_timeout_ms() -> u64 {
    8_000
}

fn default_global_deadline_ms() -> u64 {
    20_000
}

fn default_quorum() -> usize {
    1
}

fn default_weight_recompute_secs() -> u64 {
    3_600
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            provider_timeout_ms: default_provider_timeout_ms(),
            global_deadline_ms: default_global_deadline_ms(),
            quorum: default_quorum(),
            weight_recompute_secs: default_weight_recompute_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_records_path")]
    pub records_path: String,
}

fn default_records_path() -> String {
    "data/predictions.jsonl".to_string()
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.quorum == 0 {
            anyhow::bail!("engine.quorum must be at least 1");
        }
        for provider in &self.providers {
            if provider.base_weight <= 0.0 {
                anyhow::bail!("provider {} has non-positive base_weight", provider.id);
            }
            if provider.kind == ProviderKind::OpenRouter && provider.model.is_none() {
                anyhow::bail!("provider {} is openrouter but has no model", provider.id);
            }
        }
        Ok(())
    }

    /// Enabled providers, in the file's priority order.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Base weight per enabled provider, for seeding the registry.
    pub fn base_weights(&self) -> HashMap<String, f64> {
        self.enabled_providers()
            .map(|p| (p.id.clone(), p.base_weight))
            .collect()
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            provider_timeout: Duration::from_millis(self.engine.provider_timeout_ms),
            global_deadline: Duration::from_millis(self.engine.global_deadline_ms),
            quorum: self.engine.quorum,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
