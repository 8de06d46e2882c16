//! Error types for the AstroQA core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the LLM, retrieval, evaluation, configuration, and batch domains.

/// Top-level error type for the AstroQA core library.
#[derive(Debug, thiserror::Error)]
pub enum AstroQaError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Errors from the vector store and retrieval gateway.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Vector store backend error: {message}")]
    Backend { message: String },

    #[error("Malformed vector store response: {message}")]
    MalformedResponse { message: String },

    #[error("Invalid retrieval input: {reason}")]
    InvalidQuery { reason: String },
}

/// Errors from the external quality-evaluation service.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("Evaluation service error: {message}")]
    Service { message: String },

    #[error("Malformed evaluation response: {message}")]
    MalformedResponse { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the batch evaluation orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Question set has {found} entries, need at least {required}")]
    TooFewQuestions { found: usize, required: usize },

    #[error("Failed to load question set from {path}: {message}")]
    QuestionLoad { path: String, message: String },

    #[error("Failed to write report to {path}: {message}")]
    ReportWrite { path: String, message: String },
}

/// A type alias for results using the top-level `AstroQaError`.
pub type Result<T> = std::result::Result<T, AstroQaError>;
