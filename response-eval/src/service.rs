//! Evaluation service: the boundary facade over the judging pipeline
//!
//! Method results serialize to the JSON shapes clients already consume:
//! `evaluate` for single requests, `submit_batch` / `batch_status` /
//! `batch_result` for background batches.

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::{aggregate, aggregate_weighted};
use crate::batch::{
    BatchOptions, BatchOrchestrator, BatchResultView, BatchStatus, ItemError, ItemEvaluator,
    ProgressSink, StatusError, StatusLookup, StatusTracker,
};
use crate::config::{Config, ProviderConfig};
use crate::judge::{JudgeDispatcher, JudgeError};
use crate::model::{
    Dimension, DimensionScores, EvaluationInput, EvaluationRequest, EvaluationResult,
    JudgeVerdict, RuleCheck,
};
use crate::rules::RuleChecker;
use crate::storage::{JsonFileStore, NullStore, ResultStore};

const RULE_ONLY_RATIONALE: &str = "Rule-based checks only";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error(transparent)]
    Status(#[from] StatusError),
}

/// Rule and judge output for one input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredInput {
    pub rule: RuleCheck,
    /// Absent in rule-only mode
    pub verdict: Option<JudgeVerdict>,
}

/// Reply to a single evaluation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    pub id: String,
    pub score: f64,
    pub details: EvaluationDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetails {
    /// Per-dimension mean across inputs
    pub dimension_scores: DimensionScores,
    /// `input_{i}_rule_score` / `input_{i}_llm_score`, in input order
    pub individual_scores: IndexMap<String, f64>,
    /// `input_{i}_rule_issues` / `input_{i}_llm_reason`, in input order
    pub evaluation_details: IndexMap<String, Value>,
    pub model_name: String,
}

/// Acknowledgement of a queued batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmission {
    pub batch_id: String,
    pub status: BatchStatus,
    pub total: usize,
    pub message: String,
}

struct Pipeline {
    rules: RuleChecker,
    judge: JudgeDispatcher,
    rule_only: bool,
    weighted: bool,
    weights: HashMap<Dimension, f64>,
    batch: BatchOptions,
    tracker: StatusTracker,
    store: Arc<dyn ResultStore>,
}

impl Pipeline {
    async fn score_input(&self, input: &EvaluationInput) -> Result<ScoredInput, JudgeError> {
        let response = input.response_text();
        let rule = self.rules.check(&input.prompt, response);
        let verdict = if self.rule_only {
            None
        } else {
            Some(
                self.judge
                    .judge(&input.prompt, response, input.reference_text())
                    .await?,
            )
        };
        Ok(ScoredInput { rule, verdict })
    }

    fn final_score(&self, scored: &ScoredInput) -> f64 {
        match &scored.verdict {
            Some(verdict) if self.weighted && !verdict.dimension_scores.is_empty() => {
                aggregate_weighted(&verdict.dimension_scores, &self.weights)
            }
            Some(verdict) => aggregate(&[scored.rule.score, verdict.score]),
            None => aggregate(&[scored.rule.score]),
        }
    }

    /// Hand `value` to the store on the blocking pool without waiting for it
    fn persist(&self, value: Value) {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.save_result(&value) {
                tracing::warn!("Failed to save result: {}", e);
            }
        });
    }

    async fn process_batch(self: Arc<Self>, request: EvaluationRequest) {
        let batch_id = request.id.clone();
        if let Err(e) = self.tracker.mark_processing(&batch_id) {
            tracing::warn!("Batch {}: {}", batch_id, e);
            return;
        }
        tracing::info!(
            "Batch {}: evaluating {} responses from {}",
            batch_id,
            request.inputs.len(),
            request.model_name
        );

        let orchestrator = BatchOrchestrator::new(self.clone(), self.batch.clone());
        let progress = TrackerProgress {
            tracker: &self.tracker,
            batch_id: &batch_id,
        };

        let outcome = orchestrator
            .run_batch(&batch_id, &request.model_name, &request.inputs, &progress)
            .await;

        let finished = match outcome {
            Ok(summary) => {
                tracing::info!("Batch {}: {}", batch_id, summary.summary);
                let encoded = serde_json::to_value(&summary);
                let completed = self.tracker.complete(&batch_id, summary);
                match encoded {
                    Ok(value) => self.persist(value),
                    Err(e) => tracing::warn!("Failed to encode batch {}: {}", batch_id, e),
                }
                completed
            }
            Err(e) => {
                tracing::error!("Batch {} failed: {}", batch_id, e);
                self.tracker.fail(&batch_id, e.to_string())
            }
        };
        if let Err(e) = finished {
            tracing::warn!("Batch {}: {}", batch_id, e);
        }
    }
}

#[async_trait]
impl ItemEvaluator for Pipeline {
    async fn evaluate_one(
        &self,
        batch_id: &str,
        model_name: &str,
        index: usize,
        input: &EvaluationInput,
    ) -> Result<EvaluationResult, ItemError> {
        let scored = self.score_input(input).await?;
        let final_score = self.final_score(&scored);
        let ScoredInput { rule, verdict } = scored;

        let (judge_score, dimension_scores, rationale) = match verdict {
            Some(v) => (Some(v.score), v.dimension_scores, v.rationale),
            None => (None, DimensionScores::new(), RULE_ONLY_RATIONALE.to_string()),
        };

        Ok(EvaluationResult {
            id: format!("{}-{}", batch_id, index),
            model_name: model_name.to_string(),
            final_score,
            rule_score: rule.score,
            judge_score,
            dimension_scores,
            rule_issues: rule.issues,
            rationale,
            created_at: Utc::now(),
        })
    }
}

struct TrackerProgress<'a> {
    tracker: &'a StatusTracker,
    batch_id: &'a str,
}

impl ProgressSink for TrackerProgress<'_> {
    fn on_progress(&self, processed: usize, _total: usize) {
        self.tracker.record_progress(self.batch_id, processed);
    }
}

/// Cheap to clone; clones share the status tracker and store
#[derive(Clone)]
pub struct EvaluationService {
    inner: Arc<Pipeline>,
}

impl EvaluationService {
    /// Build the judge and store described by `config`
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn ResultStore> = match &config.storage.results_file {
            Some(path) => Arc::new(JsonFileStore::new(path)),
            None => Arc::new(NullStore),
        };
        Self::new(config, JudgeDispatcher::from_config(&config.judge), store)
    }

    pub fn new(config: &Config, judge: JudgeDispatcher, store: Arc<dyn ResultStore>) -> Self {
        Self {
            inner: Arc::new(Pipeline {
                rules: RuleChecker::new(),
                judge,
                rule_only: config.judge.provider == ProviderConfig::RuleOnly,
                weighted: config.scoring.use_weighted_scoring,
                weights: config.scoring.dimension_weights.to_map(),
                batch: BatchOptions::from(&config.batch),
                tracker: StatusTracker::new(),
                store,
            }),
        }
    }

    /// Name of the judge backend in use
    pub fn judge_backend(&self) -> &str {
        if self.inner.rule_only {
            "rule_only"
        } else {
            self.inner.judge.backend_name()
        }
    }

    /// Rule and judge output for one input, without aggregation or storage
    pub async fn check(&self, input: &EvaluationInput) -> Result<ScoredInput, ServiceError> {
        Ok(self.inner.score_input(input).await?)
    }

    /// Score every input of `request` and fold them into one response
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse, ServiceError> {
        let mut individual_scores = IndexMap::new();
        let mut evaluation_details = IndexMap::new();
        let mut per_dimension: HashMap<Dimension, Vec<f64>> = HashMap::new();

        for (i, input) in request.inputs.iter().enumerate() {
            let ScoredInput { rule, verdict } = self.inner.score_input(input).await?;

            individual_scores.insert(format!("input_{}_rule_score", i), rule.score);
            evaluation_details.insert(format!("input_{}_rule_issues", i), Value::from(rule.issues));

            if let Some(verdict) = verdict {
                individual_scores.insert(format!("input_{}_llm_score", i), verdict.score);
                evaluation_details.insert(
                    format!("input_{}_llm_reason", i),
                    Value::String(verdict.rationale),
                );
                for (dimension, value) in verdict.dimension_scores.iter() {
                    per_dimension.entry(dimension).or_default().push(value);
                }
            }
        }

        let dimension_scores: DimensionScores = per_dimension
            .iter()
            .map(|(dimension, values)| (*dimension, aggregate(values)))
            .collect();

        let score = if self.inner.weighted && !dimension_scores.is_empty() {
            aggregate_weighted(&dimension_scores, &self.inner.weights)
        } else {
            let all: Vec<f64> = individual_scores.values().copied().collect();
            aggregate(&all)
        };

        let response = EvaluationResponse {
            id: request.id.clone(),
            score,
            details: EvaluationDetails {
                dimension_scores,
                individual_scores,
                evaluation_details,
                model_name: request.model_name.clone(),
            },
        };

        self.inner.persist(json!({
            "id": response.id,
            "model_name": response.details.model_name,
            "final_score": response.score,
            "dimension_scores": response.details.dimension_scores,
            "individual_scores": response.details.individual_scores,
            "details": response.details.evaluation_details,
        }));

        tracing::info!(
            "Evaluated {} ({} inputs): {:.3}",
            request.id,
            request.inputs.len(),
            response.score
        );
        Ok(response)
    }

    /// Register a batch and process it on a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_batch(&self, request: EvaluationRequest) -> Result<BatchSubmission, ServiceError> {
        let batch_id = request.id.clone();
        let total = request.inputs.len();
        self.inner
            .tracker
            .register(&batch_id, &request.model_name, total)?;

        let pipeline = Arc::clone(&self.inner);
        tokio::spawn(pipeline.process_batch(request));

        Ok(BatchSubmission {
            message: format!(
                "Batch {} queued for processing. Check /batch/status/{} for progress.",
                batch_id, batch_id
            ),
            batch_id,
            status: BatchStatus::Queued,
            total,
        })
    }

    pub fn batch_status(&self, batch_id: &str) -> StatusLookup {
        self.inner.tracker.status(batch_id)
    }

    pub fn batch_result(&self, batch_id: &str) -> BatchResultView {
        self.inner.tracker.result(batch_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{Evaluator, HeuristicJudge};
    use crate::providers::{ProviderError, ProviderResult};
    use crate::storage::StoreError;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct Fixed(f64);

    #[async_trait]
    impl Evaluator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn evaluate(&self, _: &str, _: &str, _: Option<&str>) -> ProviderResult<JudgeVerdict> {
            Ok(JudgeVerdict {
                score: self.0,
                dimension_scores: DimensionScores::uniform(self.0),
                rationale: "fixed".to_string(),
            })
        }
    }

    struct Broken;

    #[async_trait]
    impl Evaluator for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn evaluate(&self, _: &str, _: &str, _: Option<&str>) -> ProviderResult<JudgeVerdict> {
            Err(ProviderError::Parse("garbage".to_string()))
        }
    }

    /// Records saves after a long stall
    #[derive(Default)]
    struct SlowStore {
        saved: Mutex<Vec<Value>>,
    }

    impl ResultStore for SlowStore {
        fn save_result(&self, result: &Value) -> Result<(), StoreError> {
            std::thread::sleep(Duration::from_millis(500));
            self.saved.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    fn service(config: &Config, evaluator: Arc<dyn Evaluator>, fallback: bool) -> EvaluationService {
        let judge = JudgeDispatcher::with_evaluator(evaluator, Duration::from_secs(1), fallback);
        EvaluationService::new(config, judge, Arc::new(NullStore))
    }

    fn request(inputs: Vec<EvaluationInput>) -> EvaluationRequest {
        EvaluationRequest {
            id: "req-1".to_string(),
            model_name: "agent-x".to_string(),
            inputs,
        }
    }

    const PROMPT: &str = "What is the capital of France?";
    const GOOD: &str = "The capital of France is Paris.";

    #[tokio::test]
    async fn test_evaluate_response_shape() {
        let svc = service(&Config::default(), Arc::new(Fixed(0.6)), true);
        let req = request(vec![
            EvaluationInput::new(PROMPT, GOOD),
            EvaluationInput::new(PROMPT, ""),
        ]);

        let resp = svc.evaluate(&req).await.unwrap();
        let keys: Vec<&str> = resp.details.individual_scores.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "input_0_rule_score",
                "input_0_llm_score",
                "input_1_rule_score",
                "input_1_llm_score"
            ]
        );
        assert_eq!(resp.details.individual_scores["input_0_rule_score"], 1.0);
        assert!((resp.details.individual_scores["input_1_rule_score"] - 0.25).abs() < 1e-9);
        assert_eq!(resp.details.evaluation_details["input_0_llm_reason"], "fixed");
        assert_eq!(
            resp.details.evaluation_details["input_0_rule_issues"],
            serde_json::json!([])
        );
        // (1.0 + 0.6 + 0.25 + 0.6) / 4
        assert!((resp.score - 0.6125).abs() < 1e-9);
        assert_eq!(resp.details.dimension_scores, DimensionScores::uniform(0.6));
        assert_eq!(resp.details.model_name, "agent-x");
    }

    #[tokio::test]
    async fn test_evaluate_weighted() {
        let mut config = Config::default();
        config.scoring.use_weighted_scoring = true;
        let svc = service(&config, Arc::new(Fixed(0.8)), true);

        let resp = svc
            .evaluate(&request(vec![EvaluationInput::new(PROMPT, GOOD)]))
            .await
            .unwrap();
        assert!((resp.score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_evaluate_without_fallback_surfaces_judge_error() {
        let svc = service(&Config::default(), Arc::new(Broken), false);
        let err = svc
            .evaluate(&request(vec![EvaluationInput::new(PROMPT, GOOD)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Judge(JudgeError::ProviderCallFailure(ProviderError::Parse(_)))
        ));
    }

    #[tokio::test]
    async fn test_rule_only_mode_skips_judge() {
        let mut config = Config::default();
        config.judge.provider = ProviderConfig::RuleOnly;
        let svc = service(&config, Arc::new(Broken), false);
        assert_eq!(svc.judge_backend(), "rule_only");

        let resp = svc
            .evaluate(&request(vec![EvaluationInput::new(PROMPT, GOOD)]))
            .await
            .unwrap();
        assert_eq!(resp.details.individual_scores.len(), 1);
        assert!(resp.details.dimension_scores.is_empty());
        assert_eq!(resp.score, 1.0);
    }

    #[tokio::test]
    async fn test_reference_only_input_is_scored_as_response() {
        let svc = EvaluationService::new(
            &Config::default(),
            JudgeDispatcher::heuristic_only(),
            Arc::new(NullStore),
        );
        let input: EvaluationInput =
            serde_json::from_str(r#"{"prompt": "What is AI?", "reference": "AI is artificial intelligence."}"#)
                .unwrap();
        let scored = svc.check(&input).await.unwrap();
        let expected = HeuristicJudge::new().judge("What is AI?", "AI is artificial intelligence.", None);
        assert_eq!(scored.verdict, Some(expected));
    }

    #[tokio::test]
    async fn test_item_ids_and_final_score() {
        let svc = service(&Config::default(), Arc::new(Fixed(0.6)), true);
        let result = svc
            .inner
            .evaluate_one("batch-9", "agent-x", 3, &EvaluationInput::new(PROMPT, GOOD))
            .await
            .unwrap();
        assert_eq!(result.id, "batch-9-3");
        assert_eq!(result.judge_score, Some(0.6));
        assert!((result.final_score - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_slow_store_does_not_delay_evaluate() {
        let store = Arc::new(SlowStore::default());
        let svc = EvaluationService::new(
            &Config::default(),
            JudgeDispatcher::heuristic_only(),
            store.clone(),
        );

        let start = Instant::now();
        let resp = svc
            .evaluate(&request(vec![EvaluationInput::new(PROMPT, GOOD)]))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(250));
        assert!(store.saved.lock().unwrap().is_empty());

        for _ in 0..100 {
            if !store.saved.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0]["id"], resp.id);
    }

    #[tokio::test]
    async fn test_batch_completes_before_slow_store_finishes() {
        let store = Arc::new(SlowStore::default());
        let mut config = Config::default();
        config.judge.provider = ProviderConfig::Heuristic;
        let svc = EvaluationService::new(&config, JudgeDispatcher::heuristic_only(), store.clone());

        svc.submit_batch(request(vec![EvaluationInput::new(PROMPT, GOOD)]))
            .unwrap();

        let mut status = BatchStatus::Queued;
        for _ in 0..25 {
            if let StatusLookup::Found(job) = svc.batch_status("req-1") {
                status = job.status;
                if status.is_terminal() {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, BatchStatus::Completed);
        assert!(store.saved.lock().unwrap().is_empty());
    }
}
