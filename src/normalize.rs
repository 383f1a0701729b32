//! Response normalization — raw model text to a structured vote.
//!
//! Models are instructed to answer in a fixed format but routinely
//! decorate labels with markdown, reorder sections, or drop them
//! entirely. The normalizer never fails: it always produces a
//! best-effort `ModelResponse`, with `parse_succeeded` recording
//! whether the action and confidence were actually extracted.
//!
//! Extraction runs as an ordered rule list (first match wins) so the
//! precedence is reproducible and testable, not ad hoc branching.

use tracing::debug;

use crate::types::{Action, ModelResponse};

/// Confidence assumed when the model did not state one.
const DEFAULT_CONFIDENCE: u8 = 50;

/// Reasoning is truncated to this many characters (audit text stays in
/// `raw_text`).
const MAX_REASONING_CHARS: usize = 300;

/// Individual risk bullets are truncated to this many characters.
const MAX_RISK_CHARS: usize = 100;

/// Normalize one raw provider reply into a structured vote.
pub fn normalize(provider_id: &str, raw_text: &str) -> ModelResponse {
    let mut parse_succeeded = true;

    let action = match find_action_line(raw_text) {
        Some(line) => classify_action(&line),
        None => {
            parse_succeeded = false;
            Action::Skip
        }
    };

    let confidence = match extract_confidence(raw_text) {
        Some(c) => c,
        None => {
            parse_succeeded = false;
            DEFAULT_CONFIDENCE
        }
    };

    // Missing reasoning/risks sections never degrade the vote.
    let reasoning = extract_reasoning(raw_text);
    let risks = extract_risks(raw_text);

    if !parse_succeeded {
        debug!(
            provider_id,
            action = %action,
            "Degraded parse — vote contributes at half weight"
        );
    }

    ModelResponse {
        provider_id: provider_id.to_string(),
        action,
        confidence,
        reasoning,
        risks,
        parse_succeeded,
        raw_text: raw_text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Action extraction
// ---------------------------------------------------------------------------

/// Locate the first line carrying an "ACTION" or "RECOMMENDATION" label
/// (case-insensitive) and return it uppercased with markdown emphasis
/// stripped.
fn find_action_line(text: &str) -> Option<String> {
    for line in text.lines() {
        let stripped = strip_emphasis(line).to_uppercase();
        if stripped.contains("ACTION") || stripped.contains("RECOMMENDATION") {
            return Some(stripped);
        }
    }
    None
}

/// Classify an action line into the canonical set.
///
/// Substring rules evaluated in fixed priority: BUY+YES, then BUY+NO,
/// then HOLD, otherwise SKIP. A line matching several rules (e.g.
/// "BUY NO, HOLD otherwise") resolves to the first match.
fn classify_action(line: &str) -> Action {
    if line.contains("BUY") && line.contains("YES") {
        Action::BuyYes
    } else if line.contains("BUY") && line.contains("NO") {
        Action::BuyNo
    } else if line.contains("HOLD") {
        Action::Hold
    } else {
        Action::Skip
    }
}

/// Remove markdown emphasis decoration (`*`, `_`, backticks).
fn strip_emphasis(line: &str) -> String {
    line.chars().filter(|c| !matches!(c, '*' | '_' | '`')).collect()
}

// ---------------------------------------------------------------------------
// Confidence extraction
// ---------------------------------------------------------------------------

/// Extract the first integer following a "CONFIDENCE" label anywhere in
/// the text, clamped to [1, 100].
fn extract_confidence(text: &str) -> Option<u8> {
    let upper = text.to_uppercase();
    let pos = upper.find("CONFIDENCE")?;
    let after = &upper[pos + "CONFIDENCE".len()..];

    let digits: String = after
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let value: u32 = digits.parse().ok()?;
    Some(value.clamp(1, 100) as u8)
}

// ---------------------------------------------------------------------------
// Section extraction
// ---------------------------------------------------------------------------

/// Extract free-text reasoning from a "REASONING:" section; falls back
/// to a prefix of the whole reply when the section is missing.
fn extract_reasoning(text: &str) -> String {
    let mut collected = String::new();
    let mut in_section = false;

    for line in text.lines() {
        let stripped = strip_emphasis(line);
        let upper = stripped.to_uppercase();

        if let Some(idx) = find_ascii_ci(&stripped, "REASONING") {
            // Inline content on the label line itself.
            let rest = &stripped[idx + "REASONING".len()..];
            let rest = rest.trim_start_matches(':').trim();
            if !rest.is_empty() {
                collected.push_str(rest);
            }
            in_section = true;
            continue;
        }

        if in_section {
            // Section ends at the next labeled line or a blank line.
            if upper.contains("RISKS")
                || upper.contains("ACTION")
                || upper.contains("CONFIDENCE")
                || stripped.trim().is_empty()
            {
                break;
            }
            if !collected.is_empty() {
                collected.push(' ');
            }
            collected.push_str(stripped.trim());
        }
    }

    if collected.is_empty() {
        collected = text.trim().chars().take(200).collect();
    }

    truncate(&collected, MAX_REASONING_CHARS)
}

/// Extract bullet items from a "RISKS" section. Absent section yields an
/// empty list.
fn extract_risks(text: &str) -> Vec<String> {
    let mut risks = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        let stripped = strip_emphasis(line);
        let upper = stripped.to_uppercase();

        if upper.contains("RISK") && !upper.contains("ACTION") {
            in_section = true;
            continue;
        }

        if in_section {
            let trimmed = stripped.trim();
            if let Some(item) = trimmed
                .strip_prefix('-')
                .or_else(|| trimmed.strip_prefix('•'))
            {
                let item = item.trim();
                if !item.is_empty() {
                    risks.push(truncate(item, MAX_RISK_CHARS));
                }
            } else if !trimmed.is_empty() {
                // Non-bullet line ends the section.
                break;
            }
        }
    }

    risks
}

/// Byte index of an ASCII needle, case-insensitive. Safe to slice at the
/// returned index plus the needle length (ASCII bytes end on a char
/// boundary).
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Action line detection --------------------------------------------

    #[test]
    fn test_action_with_markdown_emphasis() {
        let r = normalize("claude-opus", "ACTION: **BUY YES**\nCONFIDENCE: 80");
        assert_eq!(r.action, Action::BuyYes);
        assert!(r.parse_succeeded);
    }

    #[test]
    fn test_recommendation_label_hold() {
        let r = normalize("gpt-4o", "Recommendation: hold\nConfidence: 55");
        assert_eq!(r.action, Action::Hold);
        assert!(r.parse_succeeded);
    }

    #[test]
    fn test_buy_no_with_underscore() {
        let r = normalize("gemini-pro", "ACTION: BUY_NO\nCONFIDENCE: 70");
        assert_eq!(r.action, Action::BuyNo);
    }

    #[test]
    fn test_skip_action() {
        let r = normalize("llama-405b", "ACTION: SKIP\nCONFIDENCE: 40");
        assert_eq!(r.action, Action::Skip);
        assert!(r.parse_succeeded);
    }

    #[test]
    fn test_no_action_line_defaults_skip_degraded() {
        let r = normalize("deepseek-v3", "I cannot analyze this market.");
        assert_eq!(r.action, Action::Skip);
        assert!(!r.parse_succeeded);
        assert_eq!(r.confidence, 50);
    }

    #[test]
    fn test_action_line_without_keyword_is_skip() {
        // Action line found, but no recognizable keyword — rule 2 falls
        // through to SKIP while parse_succeeded stays true for the action.
        let r = normalize("mistral-large", "ACTION: abstain\nCONFIDENCE: 30");
        assert_eq!(r.action, Action::Skip);
        assert!(r.parse_succeeded);
    }

    // -- Classification precedence ----------------------------------------

    #[test]
    fn test_overlapping_keywords_resolve_by_priority() {
        // Contains BUY+NO and HOLD; BUY+NO has higher priority.
        assert_eq!(classify_action("ACTION: BUY NO, HOLD OTHERWISE"), Action::BuyNo);
        // Contains BUY+YES and BUY+NO keywords; BUY+YES wins.
        assert_eq!(classify_action("ACTION: BUY YES NOT NO"), Action::BuyYes);
        assert_eq!(classify_action("ACTION: HOLD"), Action::Hold);
        assert_eq!(classify_action("ACTION: PASS"), Action::Skip);
    }

    #[test]
    fn test_first_action_line_wins() {
        let text = "ACTION: HOLD\nACTION: BUY YES\nCONFIDENCE: 60";
        let r = normalize("claude-opus", text);
        assert_eq!(r.action, Action::Hold);
    }

    // -- Confidence extraction ---------------------------------------------

    #[test]
    fn test_confidence_extracted() {
        let r = normalize("claude-opus", "ACTION: HOLD\nCONFIDENCE: 85");
        assert_eq!(r.confidence, 85);
    }

    #[test]
    fn test_confidence_clamped_high() {
        let r = normalize("claude-opus", "ACTION: HOLD\nCONFIDENCE: 250");
        assert_eq!(r.confidence, 100);
    }

    #[test]
    fn test_confidence_clamped_low() {
        let r = normalize("claude-opus", "ACTION: HOLD\nCONFIDENCE: 0");
        assert_eq!(r.confidence, 1);
    }

    #[test]
    fn test_confidence_missing_defaults_degraded() {
        let r = normalize("claude-opus", "ACTION: BUY YES\nlooks good");
        assert_eq!(r.confidence, 50);
        assert!(!r.parse_succeeded);
        // Action still extracted.
        assert_eq!(r.action, Action::BuyYes);
    }

    #[test]
    fn test_confidence_case_insensitive_with_noise() {
        let r = normalize("claude-opus", "action: skip\nMy confidence is 72 here");
        assert_eq!(r.confidence, 72);
        assert!(r.parse_succeeded);
    }

    // -- Reasoning / risks -------------------------------------------------

    #[test]
    fn test_reasoning_section_extracted() {
        let text = "ACTION: BUY YES\nCONFIDENCE: 80\nREASONING: Market underprices the event. Data supports YES.\n\nRISKS:\n- Regulatory surprise";
        let r = normalize("claude-opus", text);
        assert_eq!(
            r.reasoning,
            "Market underprices the event. Data supports YES."
        );
    }

    #[test]
    fn test_multiline_reasoning() {
        let text = "ACTION: HOLD\nCONFIDENCE: 60\nREASONING:\nFirst point.\nSecond point.\nRISKS:\n- something";
        let r = normalize("gpt-4o", text);
        assert_eq!(r.reasoning, "First point. Second point.");
    }

    #[test]
    fn test_missing_reasoning_falls_back_to_prefix() {
        let text = "ACTION: SKIP\nCONFIDENCE: 30";
        let r = normalize("gpt-4o", text);
        assert!(r.reasoning.starts_with("ACTION: SKIP"));
        // Absence of the section never degrades the vote.
        assert!(r.parse_succeeded);
    }

    #[test]
    fn test_risks_bullets_extracted() {
        let text = "ACTION: BUY NO\nCONFIDENCE: 75\nREASONING: Overpriced.\n\nRISKS:\n- Market sentiment can shift\n- Low liquidity\nUnrelated trailing text";
        let r = normalize("gemini-pro", text);
        assert_eq!(r.risks, vec!["Market sentiment can shift", "Low liquidity"]);
    }

    #[test]
    fn test_risks_absent_is_empty() {
        let r = normalize("gemini-pro", "ACTION: HOLD\nCONFIDENCE: 50");
        assert!(r.risks.is_empty());
        assert!(r.parse_succeeded);
    }

    #[test]
    fn test_risks_with_emphasis_markers() {
        let text = "ACTION: SKIP\nCONFIDENCE: 20\nRISKS:\n- **Thin order book**";
        let r = normalize("llama-405b", text);
        assert_eq!(r.risks, vec!["Thin order book"]);
    }

    // -- Whole-response behavior -------------------------------------------

    #[test]
    fn test_raw_text_preserved() {
        let text = "ACTION: HOLD\nCONFIDENCE: 64";
        let r = normalize("claude-opus", text);
        assert_eq!(r.raw_text, text);
    }

    #[test]
    fn test_never_panics_on_garbage() {
        for garbage in ["", "\n\n\n", "ACTION", "CONFIDENCE:", "*** ___ ```"] {
            let r = normalize("p", garbage);
            assert!(Action::ALL.contains(&r.action));
            assert!((1..=100).contains(&r.confidence));
        }
    }

    #[test]
    fn test_reasoning_truncated() {
        let long = format!("ACTION: HOLD\nCONFIDENCE: 50\nREASONING: {}", "x".repeat(500));
        let r = normalize("p", &long);
        assert_eq!(r.reasoning.chars().count(), 300);
    }
}
