//! Configuration management for the evaluation engine
//!
//! Loads judge, scoring, batch and storage settings from TOML files and
//! provides runtime access.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Dimension;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub judge: JudgeConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Judging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Call an external judge at all; when false the heuristic judge is used
    #[serde(default = "default_true")]
    pub use_llm_evaluation: bool,
    /// Fall back to the heuristic judge when the external judge fails
    #[serde(default = "default_true")]
    pub use_heuristic_fallback: bool,
    /// Deadline for a single external judge call; must be positive
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Which backend judges responses. Exactly one is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProviderConfig {
    /// Rule checker only; no judge runs
    #[serde(rename = "rule_only")]
    RuleOnly,
    /// Deterministic heuristic judge
    #[serde(rename = "heuristic")]
    Heuristic,
    #[serde(rename = "openai")]
    OpenAI(RemoteProviderConfig),
    #[serde(rename = "anthropic")]
    Anthropic(RemoteProviderConfig),
    #[serde(rename = "gemini")]
    Gemini(RemoteProviderConfig),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::OpenAI(RemoteProviderConfig::default())
    }
}

impl ProviderConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderConfig::RuleOnly => "rule_only",
            ProviderConfig::Heuristic => "heuristic",
            ProviderConfig::OpenAI(_) => "openai",
            ProviderConfig::Anthropic(_) => "anthropic",
            ProviderConfig::Gemini(_) => "gemini",
        }
    }

    /// Build a default selection from a provider name
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "rule_only" | "rules" | "none" => Ok(ProviderConfig::RuleOnly),
            "heuristic" => Ok(ProviderConfig::Heuristic),
            "openai" | "gpt" => Ok(ProviderConfig::OpenAI(RemoteProviderConfig::default())),
            "anthropic" | "claude" => Ok(ProviderConfig::Anthropic(RemoteProviderConfig::default())),
            "gemini" | "google" => Ok(ProviderConfig::Gemini(RemoteProviderConfig::default())),
            other => Err(ConfigError::Invalid(format!("Unknown provider: {}", other))),
        }
    }

    /// Settings of an external backend, if one is selected
    pub fn remote(&self) -> Option<&RemoteProviderConfig> {
        match self {
            ProviderConfig::OpenAI(c) | ProviderConfig::Anthropic(c) | ProviderConfig::Gemini(c) => {
                Some(c)
            }
            ProviderConfig::RuleOnly | ProviderConfig::Heuristic => None,
        }
    }

    /// Environment variable read when no inline key is configured
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderConfig::OpenAI(_) => Some("OPENAI_API_KEY"),
            ProviderConfig::Anthropic(_) => Some("ANTHROPIC_API_KEY"),
            ProviderConfig::Gemini(_) => Some("GOOGLE_API_KEY"),
            ProviderConfig::RuleOnly | ProviderConfig::Heuristic => None,
        }
    }
}

/// Credentials and limits for an external judging backend.
///
/// Unset fields fall back to the client's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Inline key; takes precedence over `api_key_env`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Requests per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<u32>,
    /// Tokens per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<u32>,
}

/// Scoring settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub use_weighted_scoring: bool,
    #[serde(default)]
    pub dimension_weights: DimensionWeights,
}

/// Per-dimension weights used by weighted scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    #[serde(default)]
    pub instruction_following: f64,
    #[serde(default)]
    pub hallucination_prevention: f64,
    #[serde(default)]
    pub assumption_prevention: f64,
    #[serde(default)]
    pub coherence: f64,
    #[serde(default)]
    pub accuracy: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            instruction_following: 0.25,
            hallucination_prevention: 0.25,
            assumption_prevention: 0.15,
            coherence: 0.15,
            accuracy: 0.20,
        }
    }
}

impl DimensionWeights {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::InstructionFollowing => self.instruction_following,
            Dimension::HallucinationPrevention => self.hallucination_prevention,
            Dimension::AssumptionPrevention => self.assumption_prevention,
            Dimension::Coherence => self.coherence,
            Dimension::Accuracy => self.accuracy,
        }
    }

    pub fn to_map(&self) -> HashMap<Dimension, f64> {
        Dimension::ALL.iter().map(|d| (*d, self.get(*d))).collect()
    }
}

/// What happens to a batch when one item fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the batch on the first failed item
    #[default]
    FailFast,
    /// Log and drop failed items, keep going
    Skip,
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            max_workers: default_max_workers(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Result persistence settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file results are appended to; unset disables persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_file: Option<PathBuf>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_timeout_ms() -> u64 { 60_000 }
fn default_max_batch_size() -> usize { 100 }
fn default_max_workers() -> usize { 5 }

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            use_llm_evaluation: true,
            use_heuristic_fallback: true,
            timeout_ms: default_timeout_ms(),
            provider: ProviderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = ["config/eval.toml", "../config/eval.toml"];

        for path in &config_paths {
            match Self::from_file(path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", path);
                    return config;
                }
                Err(ConfigError::Io(_)) => continue,
                Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Load an explicit file, or search the default locations
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let config = Self::from_file(path)?;
                tracing::info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => Ok(Self::load_or_default()),
        }
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.judge.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "judge.timeout_ms must be greater than 0".to_string(),
            ));
        }
        for dimension in Dimension::ALL {
            let weight = self.scoring.dimension_weights.get(dimension);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "weight for {} must be a non-negative number, got {}",
                    dimension, weight
                )));
            }
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.judge.use_llm_evaluation);
        assert!(config.judge.use_heuristic_fallback);
        assert_eq!(config.judge.timeout_ms, 60_000);
        assert_eq!(config.judge.provider.kind(), "openai");
        assert!(!config.scoring.use_weighted_scoring);
        assert_eq!(config.batch.max_batch_size, 100);
        assert_eq!(config.batch.max_workers, 5);
        assert_eq!(config.batch.failure_policy, FailurePolicy::FailFast);
        assert!(config.storage.results_file.is_none());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let total: f64 = DimensionWeights::default().to_map().values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[judge]
use_heuristic_fallback = false
timeout_ms = 5000

[judge.provider]
kind = "anthropic"
model = "claude-3-haiku-20240307"
api_key_env = "MY_KEY"
rpm = 10

[scoring]
use_weighted_scoring = true

[scoring.dimension_weights]
accuracy = 1.0

[batch]
max_workers = 2
failure_policy = "skip"

[storage]
results_file = "out/results.json"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert!(config.judge.use_llm_evaluation);
        assert!(!config.judge.use_heuristic_fallback);
        assert_eq!(config.judge.timeout_ms, 5000);

        let remote = config.judge.provider.remote().unwrap();
        assert_eq!(config.judge.provider.kind(), "anthropic");
        assert_eq!(remote.model.as_deref(), Some("claude-3-haiku-20240307"));
        assert_eq!(remote.api_key_env.as_deref(), Some("MY_KEY"));
        assert_eq!(remote.rpm, Some(10));
        assert_eq!(remote.tpm, None);

        assert!(config.scoring.use_weighted_scoring);
        assert_eq!(config.scoring.dimension_weights.accuracy, 1.0);
        assert_eq!(config.scoring.dimension_weights.coherence, 0.0);

        assert_eq!(config.batch.max_batch_size, 100);
        assert_eq!(config.batch.max_workers, 2);
        assert_eq!(config.batch.failure_policy, FailurePolicy::Skip);
        assert_eq!(
            config.storage.results_file,
            Some(PathBuf::from("out/results.json"))
        );
    }

    #[test]
    fn test_parse_unit_provider() {
        let config = Config::from_toml("[judge.provider]\nkind = \"rule_only\"\n").unwrap();
        assert_eq!(config.judge.provider, ProviderConfig::RuleOnly);
        assert!(config.judge.provider.remote().is_none());
    }

    #[test]
    fn test_unknown_provider_kind_rejected() {
        let err = Config::from_toml("[judge.provider]\nkind = \"llama\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let toml = "[scoring.dimension_weights]\ncoherence = -1.0\n";
        let err = Config::from_toml(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_toml("[judge]\ntimeout_ms = 0\n").unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("timeout_ms")),
            other => panic!("expected invalid config, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_from_name() {
        assert_eq!(ProviderConfig::from_name("Claude").unwrap().kind(), "anthropic");
        assert_eq!(ProviderConfig::from_name("gemini").unwrap().kind(), "gemini");
        assert_eq!(ProviderConfig::from_name("heuristic").unwrap(), ProviderConfig::Heuristic);
        assert!(ProviderConfig::from_name("llama").is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("eval.toml");

        let mut config = Config::default();
        config.judge.provider = ProviderConfig::Gemini(RemoteProviderConfig {
            model: Some("gemini-1.5-pro".to_string()),
            ..Default::default()
        });
        config.batch.failure_policy = FailurePolicy::Skip;
        config.save_toml(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let err = Config::load(Some(Path::new("/nonexistent/eval.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
