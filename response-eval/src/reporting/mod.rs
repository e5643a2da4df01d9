//! Console and file reporting

use serde::Serialize;
use std::path::Path;

use crate::batch::BatchSummary;
use crate::model::Dimension;
use crate::service::{EvaluationResponse, ScoredInput};

/// Write any result as pretty JSON
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, json)
}

/// Console report for a finished batch
pub fn print_batch_report(summary: &BatchSummary) {
    println!("\n=== Batch {} ({}) ===\n", summary.batch_id, summary.model_name);
    println!("{}", summary.summary);
    if summary.failed_items > 0 {
        println!("Failed items: {}", summary.failed_items);
    }

    println!("\nDimension Averages:");
    println!("{:-<50}", "");
    for dimension in Dimension::ALL {
        match summary.dimension_averages.get(dimension) {
            Some(avg) => println!("  {:<26} {:.3}", dimension.display_name(), avg),
            None => println!("  {:<26} -", dimension.display_name()),
        }
    }

    let d = &summary.score_distribution;
    println!("\nScore Distribution:");
    println!("{:-<50}", "");
    println!("  Excellent (>= 0.9)  {}", d.excellent);
    println!("  Good      (0.7-0.9) {}", d.good);
    println!("  Fair      (0.5-0.7) {}", d.fair);
    println!("  Poor      (< 0.5)   {}", d.poor);

    let mut lowest: Vec<_> = summary.results.iter().collect();
    lowest.sort_by(|a, b| {
        a.final_score
            .partial_cmp(&b.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if !lowest.is_empty() {
        println!("\nLowest Scores:");
        println!("{:-<50}", "");
        for result in lowest.iter().take(5) {
            println!("  {} - {:.3}: {}", result.id, result.final_score, result.rationale);
        }
    }
}

/// Console report for a single-request evaluation
pub fn print_evaluation_report(response: &EvaluationResponse) {
    println!("\n=== Evaluation {} ({}) ===\n", response.id, response.details.model_name);
    println!("Score: {:.3}", response.score);

    if !response.details.dimension_scores.is_empty() {
        println!("\nDimensions:");
        println!("{:-<50}", "");
        for (dimension, value) in response.details.dimension_scores.iter() {
            println!("  {:<26} {:.3}", dimension.display_name(), value);
        }
    }

    println!("\nIndividual Scores:");
    println!("{:-<50}", "");
    for (key, value) in &response.details.individual_scores {
        println!("  {:<26} {:.3}", key, value);
    }
}

/// Console report for one checked input
pub fn print_check_report(scored: &ScoredInput) {
    println!("Rule score: {:.3}", scored.rule.score);
    for issue in &scored.rule.issues {
        println!("  - {}", issue);
    }

    match &scored.verdict {
        Some(verdict) => {
            println!("\nJudge score: {:.3}", verdict.score);
            for (dimension, value) in verdict.dimension_scores.iter() {
                println!("  {:<26} {:.3}", dimension.display_name(), value);
            }
            println!("Reason: {}", verdict.rationale);
        }
        None => println!("\nJudge: skipped (rule-only mode)"),
    }
}
