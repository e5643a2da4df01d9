//! Judge instruction template and verdict parsing

use regex::Regex;
use serde_json::Value;

use crate::model::{clamp_unit, Dimension, DimensionScores, JudgeVerdict};
use crate::providers::ProviderError;

/// System prompt sent with every judge request
pub const SYSTEM_PROMPT: &str = "You are an expert evaluator. Return only valid JSON.";

/// Value assumed for a dimension the judge did not report
pub const MISSING_DIMENSION_SCORE: f64 = 0.5;

fn dimension_question(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::InstructionFollowing => "Does the response follow the prompt exactly?",
        Dimension::HallucinationPrevention => "Are facts accurate or made-up?",
        Dimension::AssumptionPrevention => "Are unnecessary assumptions avoided?",
        Dimension::Coherence => "Is it logically structured?",
        Dimension::Accuracy => "Does it answer correctly?",
    }
}

/// Build the evaluation instruction for one `(prompt, response, reference)`
pub fn build_judge_prompt(prompt: &str, response: &str, reference: Option<&str>) -> String {
    let reference = reference.filter(|r| !r.is_empty());

    let mut out = String::from(
        "You are an expert evaluator of agent responses. Evaluate this response on the \
         following five dimensions and return ONLY valid JSON with numeric scores between \
         0.0 and 1.0:\n\n",
    );
    for (i, dimension) in Dimension::ALL.iter().enumerate() {
        out.push_str(&format!(
            "{}. {}: {}",
            i + 1,
            dimension.as_str(),
            dimension_question(*dimension)
        ));
        if *dimension == Dimension::Accuracy && reference.is_some() {
            out.push_str(" Compare with the reference answer if provided.");
        }
        out.push('\n');
    }

    out.push_str(&format!("\nPrompt: {}\n\nAgent Response: {}", prompt, response));
    if let Some(reference) = reference {
        out.push_str(&format!("\n\nReference/Expected Answer: {}", reference));
    }

    let keys: Vec<&str> = Dimension::ALL.iter().map(|d| d.as_str()).collect();
    out.push_str(&format!(
        "\n\nReturn JSON with keys: {}, reason\n",
        keys.join(", ")
    ));
    out
}

/// Pull the JSON object out of a reply that may be wrapped in a markdown
/// fence or surrounded by prose.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Ok(fence) = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```") {
        if let Some(m) = fence.captures(text).and_then(|c| c.get(1)) {
            return Some(m.as_str());
        }
    }

    if let Ok(object) = Regex::new(r"(?s)\{.*\}") {
        if let Some(m) = object.find(text) {
            return Some(m.as_str());
        }
    }

    None
}

fn as_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Parse a judge reply into a verdict.
///
/// Missing dimensions score 0.5 and everything is clamped. The overall score
/// is the unweighted mean of the five dimensions. `label` names the backend
/// in the default rationale.
pub fn parse_verdict(text: &str, label: &str) -> Result<JudgeVerdict, ProviderError> {
    let json = extract_json(text)
        .ok_or_else(|| ProviderError::Parse("No JSON object in judge reply".to_string()))?;

    let payload: Value = serde_json::from_str(json)
        .map_err(|e| ProviderError::Parse(format!("Invalid judge JSON: {}", e)))?;
    let object = payload
        .as_object()
        .ok_or_else(|| ProviderError::Parse("Judge reply is not a JSON object".to_string()))?;

    let mut dimension_scores = DimensionScores::new();
    for dimension in Dimension::ALL {
        let value = match object.get(dimension.as_str()) {
            None | Some(Value::Null) => MISSING_DIMENSION_SCORE,
            Some(raw) => as_score(raw).ok_or_else(|| {
                ProviderError::Parse(format!("Non-numeric score for {}: {}", dimension, raw))
            })?,
        };
        dimension_scores.set(dimension, value);
    }

    let rationale = object
        .get("reason")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Evaluated by {}", label));

    Ok(JudgeVerdict {
        score: clamp_unit(dimension_scores.mean()),
        dimension_scores,
        rationale,
    })
}
