//! Parallel fan-out to providers with an all-settled barrier.
//!
//! One bounded task per provider, each wrapped in its own timeout,
//! all nested inside a global deadline. The dispatcher never returns
//! early on partial results: calibration needs the full success/failure
//! ratio, so it waits until every task has settled or been cancelled at
//! the deadline. Provider failures are absorbed here and surfaced only
//! as a count; the sole fatal outcome is a quorum breach.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::providers::{ModelProvider, ProviderFailure};
use crate::types::ConsensusError;

/// Dispatch timing and quorum parameters.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Per-provider timeout, nested inside the global deadline.
    pub provider_timeout: Duration,
    /// Hard bound on the whole fan-out; pending tasks are cancelled
    /// when it fires.
    pub global_deadline: Duration,
    /// Minimum successful responses required to proceed.
    pub quorum: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(8),
            global_deadline: Duration::from_secs(20),
            quorum: 1,
        }
    }
}

/// Raw fan-out result: successes in completion order, plus the failure
/// count (observability only — never an aggregation input).
#[derive(Debug)]
pub struct DispatchReport {
    pub successes: Vec<(String, String)>,
    pub failures: usize,
}

/// Query every provider concurrently and wait for all of them to settle.
pub async fn dispatch(
    providers: &[Arc<dyn ModelProvider>],
    prompt: &str,
    config: &DispatchConfig,
) -> Result<DispatchReport, ConsensusError> {
    let mut tasks = JoinSet::new();

    for provider in providers {
        let provider = Arc::clone(provider);
        let prompt = prompt.to_string();
        let per_timeout = config.provider_timeout;

        tasks.spawn(async move {
            let id = provider.id().to_string();
            let result = match tokio::time::timeout(per_timeout, provider.query(&prompt, per_timeout))
                .await
            {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(failure)) => Err(failure),
                Err(_) => Err(ProviderFailure::Timeout),
            };
            (id, result)
        });
    }

    let deadline = tokio::time::Instant::now() + config.global_deadline;
    let mut successes = Vec::new();
    let mut failures = 0usize;

    loop {
        match tokio::time::timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok((id, Ok(text))))) => {
                debug!(provider = %id, chars = text.len(), "Provider replied");
                successes.push((id, text));
            }
            Ok(Some(Ok((id, Err(failure))))) => {
                warn!(provider = %id, error = %failure, "Provider failed — excluded from aggregation");
                failures += 1;
            }
            Ok(Some(Err(join_error))) => {
                warn!(error = %join_error, "Provider task aborted");
                failures += 1;
            }
            Ok(None) => break, // every task settled
            Err(_) => {
                // Global deadline: cancel what's left, count it as timed
                // out, and drain so the barrier holds.
                let pending = tasks.len();
                warn!(pending, "Global deadline reached — cancelling pending providers");
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                failures += pending;
                break;
            }
        }
    }

    if successes.len() < config.quorum {
        return Err(ConsensusError::AggregationFailed {
            succeeded: successes.len(),
            quorum: config.quorum,
        });
    }

    debug!(
        succeeded = successes.len(),
        failed = failures,
        "Dispatch complete"
    );

    Ok(DispatchReport { successes, failures })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
