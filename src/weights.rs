//! Per-provider weights recomputed from historical accuracy.
//!
//! Weights live in an immutable `WeightSnapshot` published atomically by
//! the registry. Request handlers read one consistent snapshot for the
//! whole aggregation; the periodic recompute job never mutates a
//! published snapshot in place, so readers never block the updater
//! beyond the pointer swap.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::types::PredictionRecord;

/// Weight assigned to providers absent from the snapshot.
const DEFAULT_WEIGHT: f64 = 1.0;

/// Minimum resolved records before accuracy moves a provider's weight.
const MIN_RESOLVED_SAMPLES: usize = 20;

/// Recomputed weights are clamped to this range.
const WEIGHT_FLOOR: f64 = 0.5;
const WEIGHT_CEILING: f64 = 2.0;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable provider-id → weight mapping. Never mutated once published.
#[derive(Debug, Clone)]
pub struct WeightSnapshot {
    weights: HashMap<String, f64>,
    pub version: u64,
    pub published_at: DateTime<Utc>,
}

impl WeightSnapshot {
    fn new(weights: HashMap<String, f64>, version: u64) -> Self {
        Self {
            weights,
            version,
            published_at: Utc::now(),
        }
    }

    /// Weight for a provider; unknown providers get the default 1.0.
    pub fn weight(&self, provider_id: &str) -> f64 {
        self.weights.get(provider_id).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    /// All known (provider, weight) pairs, for the API weights endpoint.
    pub fn entries(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the current snapshot and recomputes it from resolved
/// prediction records.
pub struct WeightRegistry {
    current: RwLock<Arc<WeightSnapshot>>,
    base_weights: HashMap<String, f64>,
}

impl WeightRegistry {
    /// Seed the registry with static base weights per provider.
    pub fn new(base_weights: HashMap<String, f64>) -> Self {
        let snapshot = Arc::new(WeightSnapshot::new(base_weights.clone(), 1));
        Self {
            current: RwLock::new(snapshot),
            base_weights,
        }
    }

    /// The current snapshot. Requests in flight keep using whatever
    /// snapshot they read, even if a new one is published meanwhile.
    pub fn snapshot(&self) -> Arc<WeightSnapshot> {
        self.current.read().expect("weight snapshot lock poisoned").clone()
    }

    /// Recompute weights from resolved prediction records and publish a
    /// new snapshot atomically.
    ///
    /// Providers with at least 20 resolved records get
    /// `clamp(base × accuracy × 2, 0.5, 2.0)`; providers below the
    /// sample threshold keep their prior weight.
    pub fn recompute(&self, records: &[PredictionRecord]) {
        let prior = self.snapshot();

        // (correct, total) per provider, resolved records only.
        let mut tallies: HashMap<&str, (usize, usize)> = HashMap::new();
        for record in records.iter().filter(|r| r.resolved) {
            let entry = tallies.entry(record.provider_id.as_str()).or_insert((0, 0));
            entry.1 += 1;
            if record.correct == Some(true) {
                entry.0 += 1;
            }
        }

        let mut next: HashMap<String, f64> = HashMap::new();
        for (provider_id, base) in &self.base_weights {
            let weight = match tallies.get(provider_id.as_str()) {
                Some(&(correct, total)) if total >= MIN_RESOLVED_SAMPLES => {
                    let accuracy = correct as f64 / total as f64;
                    let recomputed =
                        (base * accuracy * 2.0).clamp(WEIGHT_FLOOR, WEIGHT_CEILING);
                    debug!(
                        provider_id = %provider_id,
                        accuracy = format!("{:.2}", accuracy),
                        weight = format!("{:.2}", recomputed),
                        resolved = total,
                        "Weight recomputed from accuracy"
                    );
                    recomputed
                }
                _ => prior.weight(provider_id),
            };
            next.insert(provider_id.clone(), weight);
        }

        let version = prior.version + 1;
        let snapshot = Arc::new(WeightSnapshot::new(next, version));
        *self.current.write().expect("weight snapshot lock poisoned") = snapshot;

        info!(version, providers = self.base_weights.len(), "Weight snapshot published");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Action;

    fn base() -> HashMap<String, f64> {
        HashMap::from([
            ("claude-opus".to_string(), 1.5),
            ("gpt-4o".to_string(), 1.2),
            ("gemini-pro".to_string(), 1.0),
        ])
    }

    fn resolved_records(provider_id: &str, correct: usize, total: usize) -> Vec<PredictionRecord> {
        (0..total)
            .map(|i| PredictionRecord {
                market_id: format!("mkt-{i}"),
                provider_id: provider_id.to_string(),
                action: Action::BuyYes,
                confidence: 70,
                timestamp: Utc::now(),
                resolved: true,
                correct: Some(i < correct),
            })
            .collect()
    }

    #[test]
    fn test_seeded_snapshot() {
        let registry = WeightRegistry::new(base());
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.version, 1);
        assert!((snapshot.weight("claude-opus") - 1.5).abs() < 1e-10);
        assert!((snapshot.weight("gpt-4o") - 1.2).abs() < 1e-10);
    }

    #[test]
    fn test_unknown_provider_default_weight() {
        let registry = WeightRegistry::new(base());
        assert!((registry.snapshot().weight("unknown") - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_recompute_with_enough_samples() {
        let registry = WeightRegistry::new(base());
        // 15 of 20 correct: accuracy 0.75, multiplier 1.5 → 1.5 * 1.5 = 2.25 → clamped to 2.0
        registry.recompute(&resolved_records("claude-opus", 15, 20));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.version, 2);
        assert!((snapshot.weight("claude-opus") - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_recompute_poor_accuracy_hits_floor() {
        let registry = WeightRegistry::new(base());
        // 2 of 20 correct: accuracy 0.1, multiplier 0.2 → 1.2 * 0.2 = 0.24 → floor 0.5
        registry.recompute(&resolved_records("gpt-4o", 2, 20));
        assert!((registry.snapshot().weight("gpt-4o") - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_recompute_midrange_accuracy() {
        let registry = WeightRegistry::new(base());
        // 12 of 20 correct: accuracy 0.6, multiplier 1.2 → 1.0 * 1.2 = 1.2
        registry.recompute(&resolved_records("gemini-pro", 12, 20));
        assert!((registry.snapshot().weight("gemini-pro") - 1.2).abs() < 1e-10);
    }

    #[test]
    fn test_below_sample_threshold_keeps_prior() {
        let registry = WeightRegistry::new(base());
        registry.recompute(&resolved_records("claude-opus", 1, 19));
        assert!((registry.snapshot().weight("claude-opus") - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_unresolved_records_ignored() {
        let registry = WeightRegistry::new(base());
        let mut records = resolved_records("claude-opus", 0, 25);
        for r in &mut records {
            r.resolved = false;
            r.correct = None;
        }
        registry.recompute(&records);
        // No resolved records — prior weight kept.
        assert!((registry.snapshot().weight("claude-opus") - 1.5).abs() < 1e-10);
    }

    #[test]
    fn test_inflight_snapshot_unaffected_by_publish() {
        let registry = WeightRegistry::new(base());
        let held = registry.snapshot();
        registry.recompute(&resolved_records("claude-opus", 20, 20));

        // The held snapshot is the old one; the registry serves the new one.
        assert_eq!(held.version, 1);
        assert!((held.weight("claude-opus") - 1.5).abs() < 1e-10);
        assert_eq!(registry.snapshot().version, 2);
        assert!((registry.snapshot().weight("claude-opus") - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_recompute_keeps_prior_recomputed_weight() {
        let registry = WeightRegistry::new(base());
        registry.recompute(&resolved_records("claude-opus", 10, 20)); // accuracy 0.5 → 1.5
        registry.recompute(&[]); // no data — prior (recomputed) weight kept
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.version, 3);
        assert!((snapshot.weight("claude-opus") - 1.5).abs() < 1e-10);
    }
}
