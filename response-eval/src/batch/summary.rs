//! Batch statistics

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::model::{Dimension, DimensionScores, EvaluationResult};

/// Histogram of final scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    /// `score >= 0.9`
    pub excellent: usize,
    /// `0.7 <= score < 0.9`
    pub good: usize,
    /// `0.5 <= score < 0.7`
    pub fair: usize,
    /// `score < 0.5`
    pub poor: usize,
}

impl ScoreDistribution {
    pub fn record(&mut self, score: f64) {
        if score >= 0.9 {
            self.excellent += 1;
        } else if score >= 0.7 {
            self.good += 1;
        } else if score >= 0.5 {
            self.fair += 1;
        } else {
            self.poor += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.fair + self.poor
    }
}

/// Outcome of a completed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub model_name: String,
    pub total_evaluated: usize,
    pub average_score: f64,
    /// Only dimensions reported by at least one result
    pub dimension_averages: DimensionScores,
    pub score_distribution: ScoreDistribution,
    /// In submission order
    pub results: Vec<EvaluationResult>,
    pub summary: String,
    #[serde(default)]
    pub failed_items: usize,
}

/// Fold completed results into a [`BatchSummary`]
pub fn summarize(
    batch_id: &str,
    model_name: &str,
    results: Vec<EvaluationResult>,
    failed_items: usize,
) -> BatchSummary {
    let scores: Vec<f64> = results.iter().map(|r| r.final_score).collect();
    let average_score = aggregate(&scores);

    let mut distribution = ScoreDistribution::default();
    for score in &scores {
        distribution.record(*score);
    }

    let mut dimension_averages = DimensionScores::new();
    for dimension in Dimension::ALL {
        let values: Vec<f64> = results
            .iter()
            .filter_map(|r| r.dimension_scores.get(dimension))
            .collect();
        if !values.is_empty() {
            dimension_averages.set(dimension, aggregate(&values));
        }
    }

    let mut summary = format!(
        "Evaluated {} responses. Avg score: {:.2}%",
        results.len(),
        average_score * 100.0
    );
    if failed_items > 0 {
        summary.push_str(&format!(" ({} failed)", failed_items));
    }

    BatchSummary {
        batch_id: batch_id.to_string(),
        model_name: model_name.to_string(),
        total_evaluated: results.len(),
        average_score,
        dimension_averages,
        score_distribution: distribution,
        results,
        summary,
        failed_items,
    }
}
