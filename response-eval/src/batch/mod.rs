//! Batch evaluation: chunked orchestration, statistics and status tracking

pub mod orchestrator;
pub mod status;
pub mod summary;

pub use orchestrator::{
    BatchError, BatchOptions, BatchOrchestrator, ItemError, ItemEvaluator, NoOpProgress,
    ProgressSink,
};
pub use status::{BatchJob, BatchResultView, BatchStatus, StatusError, StatusLookup, StatusTracker};
pub use summary::{summarize, BatchSummary, ScoreDistribution};
