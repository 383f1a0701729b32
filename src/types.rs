//! Shared types for the QUORUM consensus engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that provider, engine,
//! and API modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A prediction market to be analyzed. Immutable input, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub question: String,
    /// Current YES price (0.0–1.0), also the implied YES probability.
    pub yes_price: f64,
    /// Current NO price (0.0–1.0).
    pub no_price: f64,
    /// Total volume in USD equivalent.
    pub volume: f64,
    /// Days until the market resolves.
    pub days_to_resolution: u32,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (YES: {:.0}¢ | NO: {:.0}¢ | vol: ${:.0} | {}d)",
            self.question,
            self.yes_price * 100.0,
            self.no_price * 100.0,
            self.volume,
            self.days_to_resolution,
        )
    }
}

impl Market {
    /// Implied YES probability as a percentage.
    pub fn implied_probability_pct(&self) -> f64 {
        self.yes_price * 100.0
    }

    /// Helper to build a test/sample market with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        Market {
            question: "Will CPI exceed 3% in Q1 2026?".to_string(),
            yes_price: 0.45,
            no_price: 0.55,
            volume: 50_000.0,
            days_to_resolution: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Canonical trading action extracted from a model's reply.
///
/// Every normalized response carries exactly one of these four values;
/// raw text never leaks past the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    BuyYes,
    BuyNo,
    Hold,
    Skip,
}

impl Action {
    /// All canonical actions (useful for iteration).
    pub const ALL: &'static [Action] =
        &[Action::BuyYes, Action::BuyNo, Action::Hold, Action::Skip];

    /// Canonical uppercase label, as used in prompts and API output.
    pub fn label(&self) -> &'static str {
        match self {
            Action::BuyYes => "BUY_YES",
            Action::BuyNo => "BUY_NO",
            Action::Hold => "HOLD",
            Action::Skip => "SKIP",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Analysis tier
// ---------------------------------------------------------------------------

/// Caller-selected provider subset, correlated with price and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// 1 provider — fast single check.
    Quick,
    /// 3 providers — balanced analysis.
    Standard,
    /// 6 providers — full consensus.
    Deep,
}

impl Tier {
    /// Number of providers queried at this tier.
    pub fn provider_count(&self) -> usize {
        match self {
            Tier::Quick => 1,
            Tier::Standard => 3,
            Tier::Deep => 6,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Quick => write!(f, "quick"),
            Tier::Standard => write!(f, "standard"),
            Tier::Deep => write!(f, "deep"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(Tier::Quick),
            "standard" => Ok(Tier::Standard),
            "deep" => Ok(Tier::Deep),
            _ => Err(anyhow::anyhow!("Unknown analysis tier: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Model response
// ---------------------------------------------------------------------------

/// One provider's normalized vote. Created once per dispatch, consumed
/// by the aggregator, not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub provider_id: String,
    pub action: Action,
    /// Self-reported confidence, clamped to [1, 100].
    pub confidence: u8,
    pub reasoning: String,
    pub risks: Vec<String>,
    /// False when the normalizer had to fall back to defaults; such
    /// votes contribute at half weight.
    pub parse_succeeded: bool,
    /// Original reply, preserved for audit.
    pub raw_text: String,
}

impl fmt::Display for ModelResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} conf={}{}",
            self.provider_id,
            self.action,
            self.confidence,
            if self.parse_succeeded { "" } else { " (degraded)" },
        )
    }
}

impl ModelResponse {
    /// Build a clean, fully-parsed response for tests and fixtures.
    pub fn fixture(provider_id: &str, action: Action, confidence: u8) -> Self {
        ModelResponse {
            provider_id: provider_id.to_string(),
            action,
            confidence,
            reasoning: format!("{provider_id} reasoning"),
            risks: Vec::new(),
            parse_succeeded: true,
            raw_text: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Consensus result
// ---------------------------------------------------------------------------

/// A dissenting vote: a successful response whose action differs from
/// the winning action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dissent {
    pub provider_id: String,
    pub action: Action,
    pub reasoning: String,
}

/// Final aggregated decision for one request. Returned to the caller,
/// not persisted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub action: Action,
    /// Fraction of total weighted vote mass behind the winner, in (0, 1].
    pub agreement: f64,
    /// Calibrated confidence in [1, 99].
    pub confidence: u8,
    /// Every successful per-provider vote, in completion order.
    pub models: Vec<ModelResponse>,
    /// Successful responses disagreeing with the winner.
    pub dissent: Vec<Dissent>,
}

impl fmt::Display for ConsensusResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} agreement={:.1}% conf={} ({} models, {} dissenting)",
            self.action,
            self.agreement * 100.0,
            self.confidence,
            self.models.len(),
            self.dissent.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Prediction record (weight feedback boundary)
// ---------------------------------------------------------------------------

/// Feedback-loop input: one per ModelResponse after a request completes.
/// A resolution job outside this core later flips `resolved`/`correct`;
/// the weight registry consumes only resolved records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub market_id: String,
    pub provider_id: String,
    pub action: Action,
    pub confidence: u8,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub correct: Option<bool>,
}

impl PredictionRecord {
    /// Build an unresolved record from a vote.
    pub fn from_response(market_id: &str, response: &ModelResponse) -> Self {
        PredictionRecord {
            market_id: market_id.to_string(),
            provider_id: response.provider_id.clone(),
            action: response.action,
            confidence: response.confidence,
            timestamp: Utc::now(),
            resolved: false,
            correct: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal, user-visible errors. Provider-level failures are absorbed by
/// the dispatcher and never surface here on their own.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Invalid market input: {0}")]
    Validation(String),

    #[error("Aggregation failed: {succeeded} successful responses, quorum is {quorum}")]
    AggregationFailed { succeeded: usize, quorum: usize },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Action tests --

    #[test]
    fn test_action_labels() {
        assert_eq!(Action::BuyYes.label(), "BUY_YES");
        assert_eq!(Action::BuyNo.label(), "BUY_NO");
        assert_eq!(Action::Hold.label(), "HOLD");
        assert_eq!(Action::Skip.label(), "SKIP");
    }

    #[test]
    fn test_action_labels_sort_lexicographically() {
        // The aggregator's final tie-break compares labels; pin the order.
        let mut labels: Vec<&str> = Action::ALL.iter().map(|a| a.label()).collect();
        labels.sort();
        assert_eq!(labels, vec!["BUY_NO", "BUY_YES", "HOLD", "SKIP"]);
    }

    #[test]
    fn test_action_serialization_roundtrip() {
        for action in Action::ALL {
            let json = serde_json::to_string(action).unwrap();
            let parsed: Action = serde_json::from_str(&json).unwrap();
            assert_eq!(*action, parsed);
        }
    }

    // -- Tier tests --

    #[test]
    fn test_tier_provider_counts() {
        assert_eq!(Tier::Quick.provider_count(), 1);
        assert_eq!(Tier::Standard.provider_count(), 3);
        assert_eq!(Tier::Deep.provider_count(), 6);
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("quick".parse::<Tier>().unwrap(), Tier::Quick);
        assert_eq!("STANDARD".parse::<Tier>().unwrap(), Tier::Standard);
        assert_eq!("Deep".parse::<Tier>().unwrap(), Tier::Deep);
        assert!("ultra".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Deep).unwrap(), "\"deep\"");
        let t: Tier = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(t, Tier::Standard);
    }

    // -- Market tests --

    #[test]
    fn test_market_implied_probability() {
        let market = Market::sample();
        assert!((market.implied_probability_pct() - 45.0).abs() < 1e-10);
    }

    #[test]
    fn test_market_display() {
        let market = Market::sample();
        let display = format!("{market}");
        assert!(display.contains("CPI"));
        assert!(display.contains("45¢"));
        assert!(display.contains("30d"));
    }

    #[test]
    fn test_market_serialization_roundtrip() {
        let market = Market::sample();
        let json = serde_json::to_string(&market).unwrap();
        let parsed: Market = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.question, market.question);
        assert!((parsed.yes_price - 0.45).abs() < 1e-10);
        assert_eq!(parsed.days_to_resolution, 30);
    }

    // -- ModelResponse tests --

    #[test]
    fn test_model_response_display_degraded() {
        let mut r = ModelResponse::fixture("claude-opus", Action::BuyYes, 80);
        assert!(!format!("{r}").contains("degraded"));
        r.parse_succeeded = false;
        assert!(format!("{r}").contains("degraded"));
    }

    #[test]
    fn test_model_response_serialization_roundtrip() {
        let r = ModelResponse::fixture("gpt-4o", Action::Hold, 61);
        let json = serde_json::to_string(&r).unwrap();
        let parsed: ModelResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.provider_id, "gpt-4o");
        assert_eq!(parsed.action, Action::Hold);
        assert_eq!(parsed.confidence, 61);
        assert!(parsed.parse_succeeded);
    }

    // -- PredictionRecord tests --

    #[test]
    fn test_prediction_record_from_response() {
        let r = ModelResponse::fixture("claude-opus", Action::BuyNo, 72);
        let record = PredictionRecord::from_response("mkt-1", &r);
        assert_eq!(record.market_id, "mkt-1");
        assert_eq!(record.provider_id, "claude-opus");
        assert_eq!(record.action, Action::BuyNo);
        assert!(!record.resolved);
        assert!(record.correct.is_none());
    }

    #[test]
    fn test_prediction_record_serialization_roundtrip() {
        let r = ModelResponse::fixture("mistral-large", Action::Skip, 50);
        let record = PredictionRecord::from_response("mkt-2", &r);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: PredictionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.provider_id, "mistral-large");
        assert!(parsed.correct.is_none());
    }

    // -- ConsensusResult / error tests --

    #[test]
    fn test_consensus_result_display() {
        let result = ConsensusResult {
            action: Action::BuyYes,
            agreement: 0.777,
            confidence: 72,
            models: vec![ModelResponse::fixture("a", Action::BuyYes, 75)],
            dissent: Vec::new(),
        };
        let display = format!("{result}");
        assert!(display.contains("BUY_YES"));
        assert!(display.contains("77.7%"));
    }

    #[test]
    fn test_consensus_error_display() {
        let e = ConsensusError::AggregationFailed { succeeded: 0, quorum: 1 };
        assert_eq!(
            format!("{e}"),
            "Aggregation failed: 0 successful responses, quorum is 1"
        );

        let e = ConsensusError::Validation("question is empty".to_string());
        assert!(format!("{e}").contains("question is empty"));
    }
}
