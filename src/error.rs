//! Error taxonomy for the analysis core
//!
//! Registration errors are programming-contract violations surfaced to the
//! initializer. Tool errors are caught at the per-validator isolation
//! boundary and never escape a run. Only `AnalysisError` reaches the caller
//! of `run_plan_analysis`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider error codes that indicate throttling or a transient outage
pub const RETRYABLE_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalError",
    "RequestTimeout",
];

/// Substrings (lowercase) that mark an error message as transient
pub const RETRYABLE_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "temporarily unavailable",
];

/// True when the error text matches one of the transient patterns
pub fn is_retryable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("Tool '{name}' is not a valid validator: {reason}")]
    InvalidValidator { name: String, reason: String },
}

/// Error reported by an external collaborator (cloud lookup, language backend)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.render())]
pub struct ProviderError {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Throttling/outage codes, or network/timeout wording in the message
    pub fn is_retryable(&self) -> bool {
        if let Some(code) = &self.code {
            if RETRYABLE_CODES.contains(&code.as_str()) {
                return true;
            }
        }
        is_retryable_message(&self.render())
    }

    fn render(&self) -> String {
        match &self.code {
            Some(code) => format!("{}: {}", code, self.message),
            None => self.message.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// Input did not match the validator's schema. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ToolError::InvalidInput(_) => false,
            ToolError::Provider(e) => e.is_retryable(),
            ToolError::Failed(msg) => is_retryable_message(msg),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::InvalidInput(_) => ErrorKind::InvalidInput,
            ToolError::Provider(_) => ErrorKind::Provider,
            ToolError::Failed(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::InvalidInput(e.to_string())
    }
}

/// Stable label recorded on an isolated validator failure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Provider,
    RetryExhausted,
    Timeout,
    UnknownTool,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Provider => "provider",
            ErrorKind::RetryExhausted => "retry_exhausted",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UnknownTool => "unknown_tool",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Language backend failures. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not parse backend response: {0}")]
    Parse(String),

    #[error("backend misconfigured: {0}")]
    Config(String),
}

impl LlmError {
    /// Rate limits, server errors and transport failures are retried
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Status { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529),
            LlmError::Http(msg) => is_retryable_message(msg),
            LlmError::Parse(_) | LlmError::Config(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("could not parse plan document: {0}")]
    PlanParse(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}
