//! Response evaluation engine for LLM agent outputs
//!
//! This crate scores generated responses against a prompt (and an optional
//! reference answer) along five fixed dimensions by combining a
//! deterministic rule checker with a pluggable judge.
//!
//! # Features
//!
//! - Rule-based surface checks (emptiness, length, sentence structure, prompt overlap)
//! - OpenAI, Anthropic and Gemini judges with automatic heuristic fallback
//! - Unweighted or per-dimension weighted score aggregation
//! - Chunked batch evaluation with bounded concurrency and progress tracking
//! - In-memory batch status tracking for polling clients
//!
//! # Example
//!
//! ```no_run
//! use response_eval::{
//!     config::Config,
//!     model::{EvaluationInput, EvaluationRequest},
//!     service::EvaluationService,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = EvaluationService::from_config(&Config::load_or_default());
//!
//!     let request = EvaluationRequest {
//!         id: "eval-001".to_string(),
//!         model_name: "my-agent".to_string(),
//!         inputs: vec![EvaluationInput::new("What is AI?", "AI is artificial intelligence.")
//!             .with_reference("Artificial Intelligence")],
//!     };
//!
//!     let response = service.evaluate(&request).await.unwrap();
//!     println!("score: {:.3}", response.score);
//! }
//! ```

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod judge;
pub mod model;
pub mod providers;
pub mod reporting;
pub mod rules;
pub mod service;
pub mod storage;

pub use config::Config;
pub use service::EvaluationService;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::aggregate::{aggregate, aggregate_weighted};
    pub use crate::batch::{
        BatchError, BatchJob, BatchOptions, BatchOrchestrator, BatchResultView, BatchStatus,
        BatchSummary, ItemError, ItemEvaluator, ProgressSink, StatusLookup, StatusTracker,
    };
    pub use crate::config::{Config, FailurePolicy, ProviderConfig};
    pub use crate::judge::{Evaluator, HeuristicJudge, JudgeDispatcher, JudgeError};
    pub use crate::model::{
        Dimension, DimensionScores, EvaluationInput, EvaluationRequest, EvaluationResult,
        JudgeVerdict, RuleCheck,
    };
    pub use crate::providers::{
        build_provider, CompletionRequest, CompletionResponse, LLMProvider, Message,
        ProviderError, ProviderResult,
    };
    pub use crate::rules::RuleChecker;
    pub use crate::service::{EvaluationResponse, EvaluationService, ServiceError};
    pub use crate::storage::{JsonFileStore, NullStore, ResultStore};
}
