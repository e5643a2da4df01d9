//! Score aggregation

use std::collections::HashMap;

use crate::model::{clamp_unit, Dimension, DimensionScores};

/// Unweighted mean of `scores`, clamped to `[0, 1]`. Empty input yields 0.0.
pub fn aggregate(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    clamp_unit(scores.iter().sum::<f64>() / scores.len() as f64)
}

/// Weighted mean over the dimensions named in `weights`.
///
/// A weighted dimension missing from `scores` counts as 0, pulling the
/// result down. Empty scores or a zero total weight yield 0.0.
pub fn aggregate_weighted(scores: &DimensionScores, weights: &HashMap<Dimension, f64>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let total_weight: f64 = weights.values().sum();
    if total_weight == 0.0 {
        return 0.0;
    }

    let weighted_sum: f64 = weights
        .iter()
        .map(|(dimension, weight)| scores.get(*dimension).unwrap_or(0.0) * weight)
        .sum();

    clamp_unit(weighted_sum / total_weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(Dimension, f64)]) -> HashMap<Dimension, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate(&[]), 0.0);
    }

    #[test]
    fn test_aggregate_mean() {
        assert!((aggregate(&[0.8, 0.9, 0.7]) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_clamps() {
        assert_eq!(aggregate(&[1.5, 1.5]), 1.0);
        assert_eq!(aggregate(&[-0.5]), 0.0);
    }

    #[test]
    fn test_aggregate_weighted() {
        let scores: DimensionScores = [
            (Dimension::InstructionFollowing, 0.9),
            (Dimension::Accuracy, 0.8),
        ]
        .into_iter()
        .collect();
        let w = weights(&[
            (Dimension::InstructionFollowing, 0.6),
            (Dimension::Accuracy, 0.4),
        ]);
        assert!((aggregate_weighted(&scores, &w) - 0.86).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_weighted_missing_dimension_counts_as_zero() {
        let scores: DimensionScores = [(Dimension::Accuracy, 1.0)].into_iter().collect();
        let w = weights(&[(Dimension::Accuracy, 1.0), (Dimension::Coherence, 1.0)]);
        assert!((aggregate_weighted(&scores, &w) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_weighted_degenerate_inputs() {
        let w = weights(&[(Dimension::Accuracy, 1.0)]);
        assert_eq!(aggregate_weighted(&DimensionScores::new(), &w), 0.0);

        let scores = DimensionScores::uniform(0.9);
        assert_eq!(aggregate_weighted(&scores, &HashMap::new()), 0.0);
        assert_eq!(
            aggregate_weighted(&scores, &weights(&[(Dimension::Accuracy, 0.0)])),
            0.0
        );
    }
}
