//! Deterministic surface-level checks on a response

use std::collections::HashSet;

use crate::model::{clamp_unit, RuleCheck};

const EMPTY_PENALTY: f64 = 0.3;
const SHORT_PENALTY: f64 = 0.2;
const STRUCTURE_PENALTY: f64 = 0.15;
const OVERLAP_PENALTY: f64 = 0.1;

const MIN_RESPONSE_CHARS: usize = 10;
const MIN_PROMPT_OVERLAP: f64 = 0.1;

/// Lowercased whitespace-separated word set
pub(crate) fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Fraction of `base` words that also appear in `other`.
///
/// The denominator is floored at 1 so an empty base yields 0.
pub(crate) fn overlap_ratio(base: &HashSet<String>, other: &HashSet<String>) -> f64 {
    let shared = base.intersection(other).count();
    shared as f64 / base.len().max(1) as f64
}

/// Stateless rule-based checker.
///
/// Deductions are additive and the score is only clamped once at the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleChecker;

impl RuleChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, prompt: &str, response: &str) -> RuleCheck {
        let mut score = 1.0;
        let mut issues = Vec::new();
        let trimmed = response.trim();

        if trimmed.is_empty() {
            issues.push("Response is empty".to_string());
            score -= EMPTY_PENALTY;
        }

        if trimmed.chars().count() < MIN_RESPONSE_CHARS {
            issues.push(format!(
                "Response too short (< {} chars)",
                MIN_RESPONSE_CHARS
            ));
            score -= SHORT_PENALTY;
        }

        if !response.contains(&['.', '?', '!'][..]) {
            issues.push("Response lacks sentence structure".to_string());
            score -= STRUCTURE_PENALTY;
        }

        let overlap = overlap_ratio(&word_set(prompt), &word_set(response));
        if overlap < MIN_PROMPT_OVERLAP {
            issues.push(format!(
                "Low keyword overlap with prompt ({:.1}%)",
                overlap * 100.0
            ));
            score -= OVERLAP_PENALTY;
        }

        RuleCheck {
            score: clamp_unit(score),
            issues,
        }
    }
}
