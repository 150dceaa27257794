//! Guardrail inspection of generated text

use super::{GuardrailMode, GuardrailVerdict, LanguageBackend, ViolationKind};
use crate::error::LlmError;
use crate::observability::StructuredLogger;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_BLOCKED_TEXT: &str = "Output blocked by guardrail policy";

/// Remediation advice for an infrastructure topic violation
pub fn guardrail_recommendation(violation: &str) -> &'static str {
    match violation {
        "PublicS3Buckets" => {
            "Enable S3 Block Public Access at the bucket and account level, and review bucket policies and ACLs that grant public read or write"
        }
        "UnencryptedStorage" => {
            "Enable default encryption on the storage resource using SSE-KMS with a customer managed key or AES-256"
        }
        "OverlyPermissiveIAM" => {
            "Apply least privilege: scope IAM actions and resources explicitly and avoid wildcards in policy statements"
        }
        _ => "Review the resource configuration against AWS security best practices",
    }
}

/// Result of running text through the guardrail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspected {
    Allowed,
    /// The text must not be shown; `notice` replaces it
    Blocked { notice: String },
}

pub struct GuardrailInspector {
    backend: Arc<dyn LanguageBackend>,
    logger: StructuredLogger,
    label: String,
}

impl GuardrailInspector {
    /// `label` identifies the guardrail in log events
    pub fn new(backend: Arc<dyn LanguageBackend>, label: impl Into<String>, logger: StructuredLogger) -> Self {
        Self {
            backend,
            logger,
            label: label.into(),
        }
    }

    pub async fn inspect(&self, text: &str, mode: GuardrailMode) -> Result<Inspected, LlmError> {
        let verdict = self.backend.apply_guardrail(text, mode).await?;
        if verdict.allowed {
            return Ok(Inspected::Allowed);
        }

        for violation in &verdict.violations {
            match violation.kind {
                ViolationKind::Topic => warn!(
                    violation_type = %violation.name,
                    recommendation = guardrail_recommendation(&violation.name),
                    "Infrastructure guardrail violation detected"
                ),
                ViolationKind::Content => warn!(
                    filter = %violation.name,
                    "Content policy violation detected"
                ),
                ViolationKind::SensitiveInformation => warn!(
                    entity = %violation.name,
                    "Sensitive information detected"
                ),
            }
        }

        let names: Vec<String> = verdict.violations.iter().map(|v| v.name.clone()).collect();
        self.logger.log_guardrail_violation(&self.label, &names);

        Ok(Inspected::Blocked {
            notice: blocked_notice(&verdict),
        })
    }
}

/// Replacement text for a blocked response
pub fn blocked_notice(verdict: &GuardrailVerdict) -> String {
    let mut notice = format!(
        "**⚠️ Guardrail intervention**: {}",
        verdict.output.as_deref().unwrap_or(DEFAULT_BLOCKED_TEXT)
    );

    let topics: Vec<&str> = verdict
        .violations
        .iter()
        .filter(|v| v.kind == ViolationKind::Topic)
        .map(|v| v.name.as_str())
        .collect();
    if !topics.is_empty() {
        notice.push_str("\n\n**Recommendations**:\n");
        for topic in topics {
            notice.push_str(&format!("- **{}**: {}\n", topic, guardrail_recommendation(topic)));
        }
    }
    notice
}
