//! Confidence calibration from agreement level.
//!
//! The raw signal is the unweighted mean confidence over all successful
//! responses. Agreement then scales it: strong consensus amplifies,
//! split opinion dampens. The result is clamped to [1, 99] — this core
//! never reports certainty.

use crate::types::ModelResponse;

/// Calibrated confidence bounds.
const MIN_CONFIDENCE: u8 = 1;
const MAX_CONFIDENCE: u8 = 99;

/// Multiplier for the given agreement level.
///
/// Buckets: > 0.90 → 1.2, > 0.70 → 1.0, > 0.50 → 0.8, else 0.5.
pub fn agreement_multiplier(agreement: f64) -> f64 {
    if agreement > 0.90 {
        1.2
    } else if agreement > 0.70 {
        1.0
    } else if agreement > 0.50 {
        0.8
    } else {
        0.5
    }
}

/// Calibrate the final confidence from all successful responses and the
/// winner's agreement ratio.
pub fn calibrate(responses: &[ModelResponse], agreement: f64) -> u8 {
    if responses.is_empty() {
        return MIN_CONFIDENCE;
    }

    let raw = responses
        .iter()
        .map(|r| f64::from(r.confidence))
        .sum::<f64>()
        / responses.len() as f64;

    let calibrated = (raw * agreement_multiplier(agreement)).round();
    (calibrated as i64).clamp(i64::from(MIN_CONFIDENCE), i64::from(MAX_CONFIDENCE)) as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
