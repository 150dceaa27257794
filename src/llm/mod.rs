//! Language backend used for the optional narrative summary
//!
//! Validators never call the backend. It is consumed only by
//! [`narrative::NarrativeWriter`].

pub mod guardrail;
pub mod http_client;
pub mod narrative;

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use guardrail::{guardrail_recommendation, GuardrailInspector, Inspected};
pub use http_client::HttpLanguageBackend;
pub use narrative::{extract_section, Narrative, NarrativeWriter};

/// Which side of the conversation a guardrail check applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GuardrailMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Infrastructure topic policy, e.g. `PublicS3Buckets`
    Topic,
    /// Content filter, e.g. `HATE`
    Content,
    /// Sensitive information, e.g. `AWS_ACCESS_KEY`
    SensitiveInformation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    pub kind: ViolationKind,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    pub allowed: bool,
    pub violations: Vec<GuardrailViolation>,
    /// Replacement text supplied by the guardrail when it intervened
    pub output: Option<String>,
}

impl GuardrailVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Self::default()
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    fn model(&self) -> &str;

    /// Single-turn completion
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError>;

    /// Check text against the configured guardrail; allowed when none is set
    async fn apply_guardrail(&self, text: &str, mode: GuardrailMode) -> Result<GuardrailVerdict, LlmError>;
}
