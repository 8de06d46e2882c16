//! Configuration system for AstroQA.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! Configuration is loaded from `~/.config/astroqa/config.toml` or an explicit
//! path, with `ASTROQA_`-prefixed environment variables taking precedence
//! (e.g. `ASTROQA_LLM__MODEL`, `ASTROQA_RETRIEVAL__TOP_K`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Top-level configuration for the AstroQA pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub evaluation: EvalConfig,
    pub memory: MemoryConfig,
}

/// Configuration for the LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo", "gpt-4o-mini").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Generation temperature. Kept low so grounding fidelity wins over style.
    pub temperature: f32,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retry policy for transient provider errors.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            temperature: 0.3,
            max_tokens: 600,
            timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy for transient LLM provider errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the backoff after each attempt.
    pub backoff_multiplier: f64,
    /// Upper bound on a single backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Whether to add random jitter to backoff delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            jitter: true,
        }
    }
}

/// Configuration for the vector store and retrieval gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Base URL of the vector store HTTP endpoint.
    pub base_url: String,
    /// Collection to query.
    pub collection: String,
    /// Number of passages to retrieve per question.
    pub top_k: usize,
    /// Per-query timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum characters of a single passage body kept in the prompt.
    pub max_passage_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            collection: "nasa_missions".to_string(),
            top_k: 3,
            timeout_secs: 30,
            max_passage_chars: 1200,
        }
    }
}

/// Configuration for the external quality-evaluation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Base URL of the evaluation service.
    pub base_url: String,
    /// Per-call timeout in seconds. Metric computation can be slow, so this
    /// is deliberately generous.
    pub timeout_secs: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8500".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Configuration for conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Number of user+assistant exchange pairs retained in the window.
    pub max_history_turns: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history_turns: 5,
        }
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `ASTROQA_`)
/// 2. Explicit config file (passed as argument)
/// 3. User config (`~/.config/astroqa/config.toml`)
/// 4. Built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(dirs) = directories::ProjectDirs::from("dev", "astroqa", "astroqa") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Explicit config file
    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::Invalid {
                message: format!("config file not found: {}", path.display()),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (ASTROQA_LLM__MODEL, ASTROQA_RETRIEVAL__TOP_K, etc.)
    figment = figment.merge(Env::prefixed("ASTROQA_").split("__"));

    figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}

/// Resolve the LLM API key from the environment variable named in the config.
///
/// Absence of the credential is a fatal startup error; callers must check
/// this before issuing any external call.
pub fn resolve_api_key(config: &LlmConfig) -> Result<String, ConfigError> {
    std::env::var(&config.api_key_env).map_err(|_| ConfigError::EnvVarMissing {
        var: config.api_key_env.clone(),
    })
}
