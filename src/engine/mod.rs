//! Consensus engine — the request pipeline.
//!
//! One `analyze` call runs the whole pipeline: validate and build the
//! prompt, pin a weight snapshot, fan out to the tier's providers,
//! normalize the replies, aggregate the votes, calibrate confidence,
//! and record each vote for the accuracy feedback loop.

pub mod aggregate;
pub mod calibrate;
pub mod dispatch;

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::normalize::normalize;
use crate::prompt::build_prompt;
use crate::providers::ModelProvider;
use crate::storage::PredictionStore;
use crate::types::{ConsensusError, ConsensusResult, Market, ModelResponse, PredictionRecord, Tier};
use crate::weights::WeightRegistry;

use dispatch::{dispatch, DispatchConfig};

pub struct ConsensusEngine {
    /// Providers in priority order; tiers take a prefix of this list.
    providers: Vec<Arc<dyn ModelProvider>>,
    registry: Arc<WeightRegistry>,
    store: Option<Arc<dyn PredictionStore>>,
    dispatch_config: DispatchConfig,
}

impl ConsensusEngine {
    pub fn new(
        providers: Vec<Arc<dyn ModelProvider>>,
        registry: Arc<WeightRegistry>,
        store: Option<Arc<dyn PredictionStore>>,
        dispatch_config: DispatchConfig,
    ) -> Self {
        Self {
            providers,
            registry,
            store,
            dispatch_config,
        }
    }

    /// Analyze one market at the given tier and return the consensus.
    pub async fn analyze(
        &self,
        market: &Market,
        tier: Tier,
    ) -> Result<ConsensusResult, ConsensusError> {
        let request_id = new_request_id();
        let started = Instant::now();

        let prompt = build_prompt(market)?;
        // Pinned for the whole request: a recompute mid-flight must not
        // mix two weight generations in one aggregation.
        let snapshot = self.registry.snapshot();
        let selected = self.select_providers(tier);

        info!(
            request_id = %request_id,
            tier = %tier,
            providers = selected.len(),
            weights_version = snapshot.version,
            market = %market,
            "Analysis started"
        );

        let report = dispatch(&selected, &prompt, &self.dispatch_config).await?;

        let responses: Vec<ModelResponse> = report
            .successes
            .iter()
            .map(|(provider_id, raw_text)| normalize(provider_id, raw_text))
            .collect();

        let outcome = aggregate::aggregate(&responses, &snapshot);
        let confidence = calibrate::calibrate(&responses, outcome.agreement);

        self.record_votes(&request_id, &responses);

        info!(
            request_id = %request_id,
            action = %outcome.action,
            agreement = format!("{:.3}", outcome.agreement),
            confidence,
            models = responses.len(),
            failed = report.failures,
            dissenting = outcome.dissent.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(ConsensusResult {
            action: outcome.action,
            agreement: outcome.agreement,
            confidence,
            models: responses,
            dissent: outcome.dissent,
        })
    }

    /// First N providers in priority order for the tier. With fewer
    /// providers configured than the tier asks for, all of them run.
    fn select_providers(&self, tier: Tier) -> Vec<Arc<dyn ModelProvider>> {
        self.providers
            .iter()
            .take(tier.provider_count())
            .cloned()
            .collect()
    }

    /// Persist one unresolved record per vote, off the request path.
    /// Storage failures are logged and swallowed.
    fn record_votes(&self, request_id: &str, responses: &[ModelResponse]) {
        let Some(store) = &self.store else {
            return;
        };

        for response in responses {
            let record = PredictionRecord::from_response(request_id, response);
            let store = Arc::clone(store);
            tokio::spawn(async move {
                if let Err(e) = store.append(&record).await {
                    warn!(
                        provider = %record.provider_id,
                        error = %e,
                        "Failed to persist prediction record"
                    );
                }
            });
        }
    }
}

/// Short request id for log correlation and record grouping.
fn new_request_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("req_{}", &uuid[..12])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
