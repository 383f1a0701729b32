//! QUORUM — Multi-Model Consensus Engine for Prediction Markets
//!
//! Entry point. Loads configuration, initialises structured logging,
//! constructs the provider roster and consensus engine, serves the
//! HTTP API, and runs the periodic weight-recompute job with graceful
//! shutdown.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use quorum::api;
use quorum::api::routes::ApiState;
use quorum::config::{AppConfig, ProviderConfig, ProviderKind};
use quorum::engine::ConsensusEngine;
use quorum::providers::anthropic::AnthropicProvider;
use quorum::providers::openai::OpenAiProvider;
use quorum::providers::openrouter::OpenRouterProvider;
use quorum::providers::ModelProvider;
use quorum::storage::{JsonlStore, PredictionStore};
use quorum::weights::WeightRegistry;

const BANNER: &str = r#"
  ___  _   _  ___  ____  _   _ __  __
 / _ \| | | |/ _ \|  _ \| | | |  \/  |
| | | | | | | | | | |_) | | | | |\/| |
| |_| | |_| | |_| |  _ <| |_| | |  | |
 \__\_\\___/ \___/|_| \_\\___/|_|  |_|

  Multi-Model Consensus Engine
  v0.1.0 — Prediction Market Analysis
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        providers = cfg.providers.len(),
        quorum = cfg.engine.quorum,
        port = cfg.server.port,
        "QUORUM starting up"
    );

    // -- Provider roster ---------------------------------------------------

    let providers = build_providers(&cfg);
    if providers.is_empty() {
        warn!("No providers available — every analysis will fail quorum");
    } else {
        info!(count = providers.len(), "Provider roster ready");
    }

    // -- Engine wiring -----------------------------------------------------

    let mut base_weights = cfg.base_weights();
    // Keep only providers that actually constructed; missing keys drop
    // their entries so the weights endpoint reflects the live roster.
    let live: HashSet<&str> = providers.iter().map(|p| p.id()).collect();
    base_weights.retain(|id, _| live.contains(id.as_str()));

    let registry = Arc::new(WeightRegistry::new(base_weights));
    let store: Arc<dyn PredictionStore> = Arc::new(JsonlStore::new(&cfg.storage.records_path));

    let engine = ConsensusEngine::new(
        providers,
        Arc::clone(&registry),
        Some(Arc::clone(&store)),
        cfg.dispatch_config(),
    );

    // -- API server --------------------------------------------------------

    let state = Arc::new(ApiState {
        engine,
        registry: Arc::clone(&registry),
    });
    api::spawn_server(state, &cfg.server.host, cfg.server.port)?;

    // -- Weight recompute loop ---------------------------------------------

    let recompute_interval = Duration::from_secs(cfg.engine.weight_recompute_secs);
    let mut interval = tokio::time::interval(recompute_interval);
    interval.tick().await; // First tick fires immediately; skip it.

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.engine.weight_recompute_secs,
        "Entering weight recompute loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match store.load().await {
                    Ok(records) => {
                        info!(records = records.len(), "Recomputing weights");
                        registry.recompute(&records);
                    }
                    Err(e) => error!(error = %e, "Failed to load prediction records"),
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("QUORUM shut down cleanly.");
    Ok(())
}

/// Construct every enabled provider whose API key is present. Missing
/// keys or construction failures skip the provider with a warning.
fn build_providers(cfg: &AppConfig) -> Vec<Arc<dyn ModelProvider>> {
    let mut providers: Vec<Arc<dyn ModelProvider>> = Vec::new();

    for entry in cfg.enabled_providers() {
        let Some(api_key) = read_api_key(entry) else {
            continue;
        };

        let built: Result<Arc<dyn ModelProvider>> = match entry.kind {
            ProviderKind::Anthropic => {
                AnthropicProvider::new(&entry.id, api_key, entry.model.clone())
                    .map(|p| Arc::new(p) as Arc<dyn ModelProvider>)
            }
            ProviderKind::OpenAi => OpenAiProvider::new(&entry.id, api_key, entry.model.clone())
                .map(|p| Arc::new(p) as Arc<dyn ModelProvider>),
            ProviderKind::OpenRouter => {
                // Config validation guarantees a model for openrouter.
                let model = entry.model.clone().unwrap_or_default();
                OpenRouterProvider::new(&entry.id, api_key, model)
                    .map(|p| Arc::new(p) as Arc<dyn ModelProvider>)
            }
        };

        match built {
            Ok(provider) => {
                info!(provider = %entry.id, model = ?entry.model, "Provider initialised");
                providers.push(provider);
            }
            Err(e) => warn!(provider = %entry.id, error = %e, "Provider skipped"),
        }
    }

    providers
}

fn read_api_key(entry: &ProviderConfig) -> Option<String> {
    match std::env::var(&entry.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            warn!(
                provider = %entry.id,
                env = %entry.api_key_env,
                "API key not set — provider skipped"
            );
            None
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quorum=info"));

    let json_logging = std::env::var("QUORUM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
