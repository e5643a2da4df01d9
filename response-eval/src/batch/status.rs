//! In-memory batch lifecycle tracking for external polling

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::summary::BatchSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Queued => "queued",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One batch's lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub batch_id: String,
    pub model_name: String,
    pub status: BatchStatus,
    pub total: usize,
    pub processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BatchSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Reply for an unknown batch id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingBatch {
    pub batch_id: String,
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusLookup {
    Found(BatchJob),
    NotFound(MissingBatch),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BatchResultView {
    Completed(BatchSummary),
    Unavailable { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    #[error("batch {0} is still active")]
    AlreadyActive(String),

    #[error("batch {0} already finished")]
    AlreadyFinished(String),

    #[error("batch {0} not found")]
    NotFound(String),
}

/// Concurrency-safe `batch_id -> BatchJob` map.
///
/// Terminal jobs (`completed`, `failed`) never change again; only a fresh
/// `register` under the same id replaces them.
#[derive(Debug, Default)]
pub struct StatusTracker {
    jobs: RwLock<HashMap<String, BatchJob>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BatchJob>> {
        self.jobs.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, BatchJob>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` on an active job
    fn update<F>(&self, batch_id: &str, f: F) -> Result<(), StatusError>
    where
        F: FnOnce(&mut BatchJob),
    {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(batch_id)
            .ok_or_else(|| StatusError::NotFound(batch_id.to_string()))?;
        if job.status.is_terminal() {
            return Err(StatusError::AlreadyFinished(batch_id.to_string()));
        }
        f(job);
        Ok(())
    }

    /// Record a new `queued` job with `processed = 0`
    pub fn register(&self, batch_id: &str, model_name: &str, total: usize) -> Result<(), StatusError> {
        let mut jobs = self.write();
        if let Some(existing) = jobs.get(batch_id) {
            if !existing.status.is_terminal() {
                return Err(StatusError::AlreadyActive(batch_id.to_string()));
            }
            tracing::debug!("Replacing finished batch {}", batch_id);
        }
        jobs.insert(
            batch_id.to_string(),
            BatchJob {
                batch_id: batch_id.to_string(),
                model_name: model_name.to_string(),
                status: BatchStatus::Queued,
                total,
                processed: 0,
                result: None,
                error: None,
                submitted_at: Utc::now(),
                finished_at: None,
            },
        );
        Ok(())
    }

    pub fn mark_processing(&self, batch_id: &str) -> Result<(), StatusError> {
        self.update(batch_id, |job| job.status = BatchStatus::Processing)
    }

    /// Raise `processed`, capped at `total`. Never lowers it; ignored once
    /// the job is terminal.
    pub fn record_progress(&self, batch_id: &str, processed: usize) {
        let mut jobs = self.write();
        if let Some(job) = jobs.get_mut(batch_id) {
            if !job.status.is_terminal() {
                job.processed = job.processed.max(processed.min(job.total));
            }
        }
    }

    pub fn complete(&self, batch_id: &str, summary: BatchSummary) -> Result<(), StatusError> {
        self.update(batch_id, |job| {
            job.status = BatchStatus::Completed;
            job.processed = job.total;
            job.result = Some(summary);
            job.finished_at = Some(Utc::now());
        })
    }

    pub fn fail(&self, batch_id: &str, error: impl Into<String>) -> Result<(), StatusError> {
        let error = error.into();
        self.update(batch_id, |job| {
            job.status = BatchStatus::Failed;
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        })
    }

    pub fn status(&self, batch_id: &str) -> StatusLookup {
        match self.read().get(batch_id) {
            Some(job) => StatusLookup::Found(job.clone()),
            None => StatusLookup::NotFound(MissingBatch {
                batch_id: batch_id.to_string(),
                status: "not_found",
                message: "Batch not found",
            }),
        }
    }

    pub fn result(&self, batch_id: &str) -> BatchResultView {
        match self.read().get(batch_id) {
            Some(BatchJob {
                status: BatchStatus::Completed,
                result: Some(summary),
                ..
            }) => BatchResultView::Completed(summary.clone()),
            _ => BatchResultView::Unavailable {
                error: format!("Batch {} not completed or not found", batch_id),
            },
        }
    }
}
