//! LLM Provider implementations

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod rate_limiter;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use rate_limiter::RateLimiter;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, Message, ProviderError, ProviderResult,
};

use crate::config::{ProviderConfig, RemoteProviderConfig};
use std::sync::Arc;

/// Resolve the API key: inline value first, then the configured or
/// conventional environment variable.
fn resolve_api_key(
    remote: &RemoteProviderConfig,
    default_env: &str,
) -> ProviderResult<String> {
    if let Some(key) = remote.api_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    let env = remote.api_key_env.as_deref().unwrap_or(default_env);
    match std::env::var(env) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(ProviderError::Config(format!("{} not set", env))),
    }
}

/// Build the chat client selected by `config`.
///
/// Returns `Ok(None)` for selections that never call out (`rule_only`,
/// `heuristic`).
pub fn build_provider(config: &ProviderConfig) -> ProviderResult<Option<Arc<dyn LLMProvider>>> {
    let (remote, default_env) = match (config.remote(), config.default_api_key_env()) {
        (Some(remote), Some(env)) => (remote, env),
        _ => return Ok(None),
    };
    let api_key = resolve_api_key(remote, default_env)?;

    let provider: Arc<dyn LLMProvider> = match config {
        ProviderConfig::OpenAI(_) => {
            let mut client = OpenAIClient::new(api_key);
            if let Some(url) = &remote.base_url {
                client = client.with_base_url(url);
            }
            if let Some(model) = &remote.model {
                client = client.with_model(model);
            }
            if remote.rpm.is_some() || remote.tpm.is_some() {
                client = client.with_rate_limits(
                    remote.rpm.unwrap_or(500),
                    remote.tpm.unwrap_or(200_000),
                );
            }
            Arc::new(client)
        }
        ProviderConfig::Anthropic(_) => {
            let mut client = AnthropicClient::new(api_key);
            if let Some(url) = &remote.base_url {
                client = client.with_base_url(url);
            }
            if let Some(model) = &remote.model {
                client = client.with_model(model);
            }
            if remote.rpm.is_some() || remote.tpm.is_some() {
                client = client.with_rate_limits(
                    remote.rpm.unwrap_or(60),
                    remote.tpm.unwrap_or(100_000),
                );
            }
            Arc::new(client)
        }
        ProviderConfig::Gemini(_) => {
            let mut client = GeminiClient::new(api_key);
            if let Some(url) = &remote.base_url {
                client = client.with_base_url(url);
            }
            if let Some(model) = &remote.model {
                client = client.with_model(model);
            }
            if remote.rpm.is_some() || remote.tpm.is_some() {
                client = client.with_rate_limits(
                    remote.rpm.unwrap_or(60),
                    remote.tpm.unwrap_or(1_000_000),
                );
            }
            Arc::new(client)
        }
        ProviderConfig::RuleOnly | ProviderConfig::Heuristic => return Ok(None),
    };

    tracing::debug!(
        "Built {} client (model {})",
        provider.name(),
        provider.default_model()
    );
    Ok(Some(provider))
}
