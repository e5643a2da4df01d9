//! Judging: provider-backed evaluation with heuristic fallback
//!
//! The [`JudgeDispatcher`] picks its backend once, at construction, from the
//! judge configuration. Every call to an external backend runs under a
//! deadline; any failure either falls back to the [`HeuristicJudge`] or is
//! surfaced as a [`JudgeError`], depending on configuration.

pub mod heuristic;
pub mod prompt;

pub use heuristic::HeuristicJudge;
pub use prompt::{build_judge_prompt, parse_verdict};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::JudgeConfig;
use crate::model::JudgeVerdict;
use crate::providers::{
    build_provider, CompletionRequest, LLMProvider, Message, ProviderError, ProviderResult,
};

const JUDGE_MAX_TOKENS: u32 = 1024;
const JUDGE_TEMPERATURE: f32 = 0.3;

/// Anything that can score a response along the five dimensions
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(
        &self,
        prompt: &str,
        response: &str,
        reference: Option<&str>,
    ) -> ProviderResult<JudgeVerdict>;
}

/// Judge backed by a chat-completion client
pub struct ProviderJudge {
    provider: Arc<dyn LLMProvider>,
}

impl ProviderJudge {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    fn label(&self) -> &str {
        match self.provider.name() {
            "openai" => "OpenAI",
            "anthropic" => "Anthropic",
            "gemini" => "Gemini",
            other => other,
        }
    }
}

#[async_trait]
impl Evaluator for ProviderJudge {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn evaluate(
        &self,
        prompt: &str,
        response: &str,
        reference: Option<&str>,
    ) -> ProviderResult<JudgeVerdict> {
        let request = CompletionRequest::new(
            vec![Message::user(build_judge_prompt(prompt, response, reference))],
            JUDGE_MAX_TOKENS,
        )
        .with_system(prompt::SYSTEM_PROMPT)
        .with_temperature(JUDGE_TEMPERATURE)
        .with_json_output();

        let completion = self.provider.complete(&request).await?;
        tracing::debug!(
            "{} judged in {}ms ({} tokens)",
            completion.model,
            completion.latency_ms,
            completion.input_tokens + completion.output_tokens
        );
        parse_verdict(&completion.content, self.label())
    }
}

/// Judge errors surfaced when fallback is disabled
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Judge provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Judge provider call failed: {0}")]
    ProviderCallFailure(#[source] ProviderError),
}

enum Backend {
    /// External judging switched off; the heuristic judge answers
    Disabled,
    Ready(Arc<dyn Evaluator>),
    /// Construction failed; every call reports this reason
    Unavailable(String),
}

/// Routes judge calls to the configured backend
pub struct JudgeDispatcher {
    backend: Backend,
    heuristic: HeuristicJudge,
    timeout: Duration,
    fallback: bool,
}

impl JudgeDispatcher {
    /// Select the backend from configuration
    pub fn from_config(config: &JudgeConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let fallback = config.use_heuristic_fallback;

        if !config.use_llm_evaluation {
            return Self::heuristic_only();
        }

        match build_provider(&config.provider) {
            Ok(Some(provider)) => {
                tracing::info!(
                    "Judging with {} ({})",
                    provider.name(),
                    provider.default_model()
                );
                Self::with_evaluator(Arc::new(ProviderJudge::new(provider)), timeout, fallback)
            }
            Ok(None) => Self::heuristic_only(),
            Err(e) => {
                tracing::warn!("{} judge unavailable: {}", config.provider.kind(), e);
                Self::unavailable(e.to_string(), fallback)
            }
        }
    }

    pub fn with_evaluator(evaluator: Arc<dyn Evaluator>, timeout: Duration, fallback: bool) -> Self {
        Self {
            backend: Backend::Ready(evaluator),
            heuristic: HeuristicJudge::new(),
            timeout,
            fallback,
        }
    }

    pub fn heuristic_only() -> Self {
        Self {
            backend: Backend::Disabled,
            heuristic: HeuristicJudge::new(),
            timeout: Duration::ZERO,
            fallback: true,
        }
    }

    pub fn unavailable(reason: impl Into<String>, fallback: bool) -> Self {
        Self {
            backend: Backend::Unavailable(reason.into()),
            heuristic: HeuristicJudge::new(),
            timeout: Duration::ZERO,
            fallback,
        }
    }

    /// Name of the backend that answers when nothing fails
    pub fn backend_name(&self) -> &str {
        match &self.backend {
            Backend::Disabled => "heuristic",
            Backend::Ready(evaluator) => evaluator.name(),
            Backend::Unavailable(_) => "unavailable",
        }
    }

    pub async fn judge(
        &self,
        prompt: &str,
        response: &str,
        reference: Option<&str>,
    ) -> Result<JudgeVerdict, JudgeError> {
        let failure = match &self.backend {
            Backend::Disabled => return Ok(self.heuristic.judge(prompt, response, reference)),
            Backend::Unavailable(reason) => JudgeError::ProviderUnavailable(reason.clone()),
            Backend::Ready(evaluator) => {
                match tokio::time::timeout(
                    self.timeout,
                    evaluator.evaluate(prompt, response, reference),
                )
                .await
                {
                    Ok(Ok(verdict)) => return Ok(verdict),
                    Ok(Err(e)) => JudgeError::ProviderCallFailure(e),
                    Err(_) => JudgeError::ProviderCallFailure(ProviderError::Timeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }),
                }
            }
        };

        if self.fallback {
            tracing::warn!("{}. Falling back to heuristic judge.", failure);
            Ok(self.heuristic.judge(prompt, response, reference))
        } else {
            Err(failure)
        }
    }
}
