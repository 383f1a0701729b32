//! Weighted vote aggregation.
//!
//! Each successful vote contributes `weight × confidence × degradation`
//! to its action's score, where degradation halves the contribution of
//! votes whose extraction was unreliable. The winning action takes the
//! largest accumulated score; exact ties resolve through a fixed
//! two-step chain so aggregation is fully deterministic.

use std::collections::HashMap;
use tracing::debug;

use crate::types::{Action, Dissent, ModelResponse};
use crate::weights::WeightSnapshot;

/// Score multiplier for votes with `parse_succeeded == false`.
const DEGRADED_MULTIPLIER: f64 = 0.5;

/// Outcome of aggregating one request's votes.
#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub action: Action,
    /// winner score / total score, in (0, 1].
    pub agreement: f64,
    pub dissent: Vec<Dissent>,
}

/// Aggregate all successful votes under one weight snapshot.
///
/// Deterministic: identical inputs always yield the identical outcome.
/// Callers must enforce quorum first; an empty slice is treated as the
/// degenerate case (winner SKIP, agreement 1.0).
pub fn aggregate(responses: &[ModelResponse], weights: &WeightSnapshot) -> VoteOutcome {
    let mut scores: HashMap<Action, f64> = HashMap::new();
    let mut total = 0.0;

    for response in responses {
        let degradation = if response.parse_succeeded {
            1.0
        } else {
            DEGRADED_MULTIPLIER
        };
        let score =
            weights.weight(&response.provider_id) * f64::from(response.confidence) * degradation;
        *scores.entry(response.action).or_insert(0.0) += score;
        total += score;
    }

    if total == 0.0 {
        // Degenerate: no vote mass at all.
        return VoteOutcome {
            action: Action::Skip,
            agreement: 1.0,
            dissent: dissent_against(responses, Action::Skip),
        };
    }

    let winner = pick_winner(&scores, responses);
    let agreement = scores.get(&winner).copied().unwrap_or(0.0) / total;

    debug!(
        winner = %winner,
        agreement = format!("{:.3}", agreement),
        votes = responses.len(),
        "Votes aggregated"
    );

    VoteOutcome {
        action: winner,
        agreement,
        dissent: dissent_against(responses, winner),
    }
}

/// Winning action: max score, then (on exact score equality) higher
/// unweighted mean raw confidence among supporters, then the
/// lexicographically smaller action label.
fn pick_winner(scores: &HashMap<Action, f64>, responses: &[ModelResponse]) -> Action {
    let max_score = scores.values().copied().fold(f64::MIN, f64::max);
    let mut tied: Vec<Action> = scores
        .iter()
        .filter(|(_, s)| **s == max_score)
        .map(|(a, _)| *a)
        .collect();

    if tied.len() == 1 {
        return tied[0];
    }

    tied.sort_by(|a, b| {
        mean_confidence(responses, *b)
            .partial_cmp(&mean_confidence(responses, *a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.label().cmp(b.label()))
    });
    tied[0]
}

/// Unweighted mean raw confidence of an action's supporters.
fn mean_confidence(responses: &[ModelResponse], action: Action) -> f64 {
    let supporters: Vec<f64> = responses
        .iter()
        .filter(|r| r.action == action)
        .map(|r| f64::from(r.confidence))
        .collect();
    if supporters.is_empty() {
        0.0
    } else {
        supporters.iter().sum::<f64>() / supporters.len() as f64
    }
}

/// Every successful response voting against the winner, in input order.
fn dissent_against(responses: &[ModelResponse], winner: Action) -> Vec<Dissent> {
    responses
        .iter()
        .filter(|r| r.action != winner)
        .map(|r| Dissent {
            provider_id: r.provider_id.clone(),
            action: r.action,
            reasoning: r.reasoning.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
