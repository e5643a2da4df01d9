//! Chunked, bounded-concurrency batch runner

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::summary::{summarize, BatchSummary};
use crate::config::{BatchConfig, FailurePolicy};
use crate::judge::JudgeError;
use crate::model::{EvaluationInput, EvaluationResult};

/// Scores one batch item. Injected into the orchestrator.
#[async_trait]
pub trait ItemEvaluator: Send + Sync {
    /// `index` is the item's position in the whole batch
    async fn evaluate_one(
        &self,
        batch_id: &str,
        model_name: &str,
        index: usize,
        input: &EvaluationInput,
    ) -> Result<EvaluationResult, ItemError>;
}

/// Receives `(processed, total)` once per finished chunk
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, processed: usize, total: usize);
}

/// Default no-op progress sink
pub struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn on_progress(&self, _processed: usize, _total: usize) {}
}

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error("evaluation task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("item {index} failed: {source}")]
    ItemFailed {
        index: usize,
        #[source]
        source: ItemError,
    },
}

/// Batch execution settings
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Items per chunk; 0 is treated as 1
    pub max_batch_size: usize,
    /// Concurrent items within a chunk; 0 is treated as 1
    pub max_workers: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            max_workers: config.max_workers,
            failure_policy: config.failure_policy,
        }
    }
}

/// Runs batches chunk by chunk
pub struct BatchOrchestrator {
    evaluator: Arc<dyn ItemEvaluator>,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(evaluator: Arc<dyn ItemEvaluator>, options: BatchOptions) -> Self {
        Self { evaluator, options }
    }

    /// Evaluate `inputs` and fold the results into a summary.
    ///
    /// Chunks run strictly one after another. Within a chunk every item is
    /// spawned, gated by a semaphore of `max_workers` permits, and the whole
    /// chunk is awaited before progress is reported. Results keep submission
    /// order.
    pub async fn run_batch(
        &self,
        batch_id: &str,
        model_name: &str,
        inputs: &[EvaluationInput],
        progress: &dyn ProgressSink,
    ) -> Result<BatchSummary, BatchError> {
        let total = inputs.len();
        let chunk_size = self.options.max_batch_size.max(1);
        let semaphore = Arc::new(Semaphore::new(self.options.max_workers.max(1)));
        let shared_batch_id: Arc<str> = Arc::from(batch_id);
        let shared_model: Arc<str> = Arc::from(model_name);

        let mut results = Vec::with_capacity(total);
        let mut failed_items = 0;
        let mut processed = 0;

        for (chunk_index, chunk) in inputs.chunks(chunk_size).enumerate() {
            let offset = chunk_index * chunk_size;

            let mut handles = Vec::with_capacity(chunk.len());
            for (i, input) in chunk.iter().enumerate() {
                let index = offset + i;
                let input = input.clone();
                let evaluator = Arc::clone(&self.evaluator);
                let semaphore = Arc::clone(&semaphore);
                let batch_id = Arc::clone(&shared_batch_id);
                let model_name = Arc::clone(&shared_model);

                handles.push(tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| ItemError::Aborted(e.to_string()))?;
                    evaluator
                        .evaluate_one(&batch_id, &model_name, index, &input)
                        .await
                }));
            }

            let mut pending = handles.into_iter().enumerate();
            while let Some((i, handle)) = pending.next() {
                let index = offset + i;
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(ItemError::Aborted(e.to_string())),
                };

                match outcome {
                    Ok(result) => results.push(result),
                    Err(source) => match self.options.failure_policy {
                        FailurePolicy::FailFast => {
                            pending.for_each(|(_, rest)| rest.abort());
                            tracing::error!("Batch {}: item {} failed: {}", batch_id, index, source);
                            return Err(BatchError::ItemFailed { index, source });
                        }
                        FailurePolicy::Skip => {
                            tracing::warn!(
                                "Batch {}: skipping item {}: {}",
                                batch_id,
                                index,
                                source
                            );
                            failed_items += 1;
                        }
                    },
                }
            }

            processed += chunk.len();
            tracing::info!("Batch {}: processed {}/{}", batch_id, processed, total);
            progress.on_progress(processed, total);
        }

        Ok(summarize(batch_id, model_name, results, failed_items))
    }
}
