//! Core evaluation types shared by the checker, judges and batch engine

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Clamp a score into `[0, 1]`. NaN collapses to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One of the five fixed evaluation axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    InstructionFollowing,
    HallucinationPrevention,
    AssumptionPrevention,
    Coherence,
    Accuracy,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::InstructionFollowing,
        Dimension::HallucinationPrevention,
        Dimension::AssumptionPrevention,
        Dimension::Coherence,
        Dimension::Accuracy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::InstructionFollowing => "instruction_following",
            Dimension::HallucinationPrevention => "hallucination_prevention",
            Dimension::AssumptionPrevention => "assumption_prevention",
            Dimension::Coherence => "coherence",
            Dimension::Accuracy => "accuracy",
        }
    }

    /// Title-cased label for console output
    pub fn display_name(&self) -> &'static str {
        match self {
            Dimension::InstructionFollowing => "Instruction Following",
            Dimension::HallucinationPrevention => "Hallucination Prevention",
            Dimension::AssumptionPrevention => "Assumption Prevention",
            Dimension::Coherence => "Coherence",
            Dimension::Accuracy => "Accuracy",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-dimension scores. Values are clamped to `[0, 1]` on insert.
///
/// A dimension that was never reported is simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionScores(BTreeMap<Dimension, f64>);

impl DimensionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five dimensions set to the same value
    pub fn uniform(value: f64) -> Self {
        Dimension::ALL.iter().map(|d| (*d, value)).collect()
    }

    pub fn set(&mut self, dimension: Dimension, value: f64) {
        self.0.insert(dimension, clamp_unit(value));
    }

    pub fn get(&self, dimension: Dimension) -> Option<f64> {
        self.0.get(&dimension).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when every dimension has a value
    pub fn is_complete(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.0.contains_key(d))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        self.0.iter().map(|(d, v)| (*d, *v))
    }

    /// Unweighted mean of the present values, 0.0 when empty
    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        clamp_unit(self.0.values().sum::<f64>() / self.0.len() as f64)
    }
}

impl FromIterator<(Dimension, f64)> for DimensionScores {
    fn from_iter<I: IntoIterator<Item = (Dimension, f64)>>(iter: I) -> Self {
        let mut scores = DimensionScores::new();
        for (dimension, value) in iter {
            scores.set(dimension, value);
        }
        scores
    }
}

/// A single `(prompt, response, reference)` tuple to be scored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub prompt: String,
    #[serde(default, alias = "agent_response", skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl EvaluationInput {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: Some(response.into()),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Text that gets scored.
    ///
    /// Requests that only carry `{prompt, reference}` are scored on the
    /// reference text itself.
    pub fn response_text(&self) -> &str {
        self.response
            .as_deref()
            .or(self.reference.as_deref())
            .unwrap_or("")
    }

    /// Reference used for the overlap heuristic; only meaningful when a
    /// separate response was supplied.
    pub fn reference_text(&self) -> Option<&str> {
        match (&self.response, &self.reference) {
            (Some(_), Some(reference)) if !reference.is_empty() => Some(reference),
            _ => None,
        }
    }
}

/// Output of the rule checker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub score: f64,
    pub issues: Vec<String>,
}

/// Output of any judge (provider-backed or heuristic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub score: f64,
    pub dimension_scores: DimensionScores,
    pub rationale: String,
}

/// Final scored result for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: String,
    pub model_name: String,
    pub final_score: f64,
    pub rule_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge_score: Option<f64>,
    pub dimension_scores: DimensionScores,
    pub rule_issues: Vec<String>,
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

/// Request body shared by single and batch evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub id: String,
    pub model_name: String,
    pub inputs: Vec<EvaluationInput>,
}
