//! Prompt construction for the analysis request.
//!
//! Pure and deterministic: the same `Market` always yields the same
//! prompt text. Every provider receives the identical prompt so their
//! votes are comparable.

use crate::types::{ConsensusError, Market};

/// Build the canonical analysis prompt for a market.
///
/// Carries the question, both prices with implied probabilities, volume,
/// and days to resolution, then the exact output format the normalizer
/// expects (ACTION / CONFIDENCE / REASONING / RISKS).
///
/// Fails with `ConsensusError::Validation` when the question is empty or
/// either price falls outside [0, 1]. No side effects.
pub fn build_prompt(market: &Market) -> Result<String, ConsensusError> {
    validate(market)?;

    let yes_pct = market.yes_price * 100.0;
    let no_pct = market.no_price * 100.0;

    let mut prompt = String::with_capacity(1024);

    prompt.push_str("Analyze this prediction market:\n\n");
    prompt.push_str(&format!("MARKET: {}\n", market.question));
    prompt.push_str(&format!(
        "YES Price: ${:.2} ({yes_pct:.0}% implied probability)\n",
        market.yes_price
    ));
    prompt.push_str(&format!(
        "NO Price: ${:.2} ({no_pct:.0}% implied probability)\n",
        market.no_price
    ));
    prompt.push_str(&format!("Volume: ${:.0}\n", market.volume));
    prompt.push_str(&format!(
        "Days to resolution: {}\n",
        market.days_to_resolution
    ));

    prompt.push_str(
        "\nProvide a brief analysis (max 150 words) in exactly this format:\n\
         ACTION: [BUY_YES / BUY_NO / HOLD / SKIP]\n\
         CONFIDENCE: [1-100]\n\
         REASONING: [2-3 sentences explaining your decision]\n\
         RISKS:\n\
         - [risk 1]\n\
         - [risk 2]\n\
         \nBe concise and decisive.",
    );

    Ok(prompt)
}

fn validate(market: &Market) -> Result<(), ConsensusError> {
    if market.question.trim().is_empty() {
        return Err(ConsensusError::Validation("question is empty".to_string()));
    }
    if !(0.0..=1.0).contains(&market.yes_price) {
        return Err(ConsensusError::Validation(format!(
            "yes_price {} outside [0, 1]",
            market.yes_price
        )));
    }
    if !(0.0..=1.0).contains(&market.no_price) {
        return Err(ConsensusError::Validation(format!(
            "no_price {} outside [0, 1]",
            market.no_price
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
