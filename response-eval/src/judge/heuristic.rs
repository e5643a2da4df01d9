//! Deterministic phrase-based judge used when no external judge is available

use crate::model::{clamp_unit, Dimension, DimensionScores, JudgeVerdict};
use crate::rules::{overlap_ratio, word_set};

const BASELINE: f64 = 0.8;

const SPECULATIVE_PHRASES: &[&str] = &[
    "i think", "probably", "maybe", "i guess", "it seems", "could be",
];
const ASSUMPTION_PHRASES: &[&str] = &["assuming", "if we assume", "without knowing", "unclear if"];
const HEDGE_WORDS: &[&str] = &["somewhat", "slightly", "relatively", "quite", "rather"];

const MIN_DETAILED_CHARS: usize = 50;
const MIN_REFERENCE_SIMILARITY: f64 = 0.3;

/// Number of distinct listed phrases present in `lowered`
fn count_present(lowered: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|p| lowered.contains(*p)).count()
}

fn deduct(dims: &mut [(Dimension, f64)], dimension: Dimension, amount: f64) {
    if let Some(entry) = dims.iter_mut().find(|(d, _)| *d == dimension) {
        entry.1 -= amount;
    }
}

/// Rule-of-thumb judge scoring speculation, assumptions, brevity, reference
/// similarity and hedging.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    pub fn new() -> Self {
        Self
    }

    pub fn judge(&self, _prompt: &str, response: &str, reference: Option<&str>) -> JudgeVerdict {
        let lowered = response.to_lowercase();
        let mut score = BASELINE;
        let mut dims: Vec<(Dimension, f64)> =
            Dimension::ALL.iter().map(|d| (*d, BASELINE)).collect();
        let mut reasons = Vec::new();

        let speculative = count_present(&lowered, SPECULATIVE_PHRASES);
        if speculative > 2 {
            score -= 0.15;
            deduct(&mut dims, Dimension::HallucinationPrevention, 0.2);
            reasons.push(format!(
                "Detected {} speculative phrases (possible hallucination)",
                speculative
            ));
        }

        let assumptions = count_present(&lowered, ASSUMPTION_PHRASES);
        if assumptions > 1 {
            score -= 0.1;
            deduct(&mut dims, Dimension::AssumptionPrevention, 0.15);
            reasons.push(format!("Detected {} assumptions", assumptions));
        }

        if response.trim().chars().count() < MIN_DETAILED_CHARS {
            score -= 0.1;
            deduct(&mut dims, Dimension::Accuracy, 0.15);
            reasons.push("Response is brief; may lack detail".to_string());
        }

        if let Some(reference) = reference.filter(|r| !r.is_empty()) {
            let reference_words = word_set(reference);
            if !reference_words.is_empty() {
                let similarity = overlap_ratio(&reference_words, &word_set(response));
                if similarity < MIN_REFERENCE_SIMILARITY {
                    score -= 0.1;
                    deduct(&mut dims, Dimension::Accuracy, 0.15);
                    reasons.push(format!(
                        "Low similarity with reference ({:.1}%)",
                        similarity * 100.0
                    ));
                }
            }
        }

        let hedges = count_present(&lowered, HEDGE_WORDS);
        if hedges > 1 {
            score -= 0.05;
            deduct(&mut dims, Dimension::Coherence, 0.1);
            reasons.push(format!("Detected {} hedging words (lower confidence)", hedges));
        }

        let rationale = if reasons.is_empty() {
            "Response meets evaluation criteria (heuristic evaluation)".to_string()
        } else {
            reasons.join("; ")
        };

        JudgeVerdict {
            score: clamp_unit(score),
            dimension_scores: dims.into_iter().collect::<DimensionScores>(),
            rationale,
        }
    }
}
