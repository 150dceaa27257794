//! Narrative summary of a plan, split into three report sections

use super::guardrail::{GuardrailInspector, Inspected};
use super::{GuardrailMode, LanguageBackend};
use crate::coordinator::{retry_with_backoff, RetryPolicy};
use crate::error::LlmError;
use crate::models::PlanDocument;
use crate::observability::StructuredLogger;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

pub const PLAN_SUMMARY: &str = "Plan-Summary";
pub const IMPACT_ANALYSIS: &str = "Impact-Analysis";
pub const AMI_SUMMARY: &str = "AMI-Summary";

/// Changes included verbatim in the prompt
const PROMPT_CHANGE_LIMIT: usize = 20;

const SYSTEM_PROMPT: &str = "You are an AWS infrastructure analyst. Provide detailed analysis in three distinct sections: Plan-Summary, Impact-Analysis, and AMI-Summary. Be specific with resource details.";

const NEXT_SECTION_MARKERS: &[&str] = &[
    "**SECTION 2:",
    "**SECTION 3:",
    "**Impact-Analysis**",
    "**AMI-Summary**",
    "## Impact-Analysis",
    "## AMI-Summary",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Narrative {
    pub plan_summary: String,
    pub impact_analysis: String,
    pub ami_summary: String,
}

impl Narrative {
    pub fn from_response(text: &str) -> Self {
        Self {
            plan_summary: extract_section(text, PLAN_SUMMARY, "SECTION 1"),
            impact_analysis: extract_section(text, IMPACT_ANALYSIS, "SECTION 2"),
            ami_summary: extract_section(text, AMI_SUMMARY, "SECTION 3"),
        }
    }
}

/// Pull one section out of a three-section response
///
/// Looks for the section heading in the usual markdown shapes, then ends the
/// section at the nearest following section heading. When no heading is found
/// the text is split into thirds and the matching third is returned.
pub fn extract_section(text: &str, section_name: &str, section_marker: &str) -> String {
    let markers = [
        format!("**{}: {}**", section_marker, section_name),
        format!("**{}**", section_name),
        format!("## {}", section_name),
        format!("# {}", section_name),
        section_marker.to_string(),
        format!("**{}:", section_marker),
    ];

    let found = markers
        .iter()
        .find_map(|m| text.find(m.as_str()).map(|idx| (idx, m.len())));

    let Some((start, marker_len)) = found else {
        return third_of(text, section_name).trim().to_string();
    };

    let search_from = start + marker_len;
    let end = NEXT_SECTION_MARKERS
        .iter()
        .filter_map(|m| text[search_from..].find(m).map(|idx| search_from + idx))
        .min()
        .unwrap_or(text.len());

    text[start..end].trim().to_string()
}

fn third_of<'a>(text: &'a str, section_name: &str) -> &'a str {
    let total = text.chars().count();
    let (from, to) = if section_name.contains("Plan") {
        (0, total / 3)
    } else if section_name.contains("Impact") {
        (total / 3, 2 * total / 3)
    } else {
        (2 * total / 3, total)
    };

    let byte_at = |n: usize| text.char_indices().nth(n).map(|(i, _)| i).unwrap_or(text.len());
    &text[byte_at(from)..byte_at(to)]
}

pub fn build_prompt(plan: &PlanDocument) -> String {
    let summary = plan.summary();
    let shown = &plan.resource_changes[..plan.resource_changes.len().min(PROMPT_CHANGE_LIMIT)];
    let changes = serde_json::to_string(shown).unwrap_or_default();

    format!(
        r#"Analyze this Terraform plan and provide THREE distinct sections:

**SECTION 1: Plan-Summary**
Format as markdown with these subsections:
- **Networking**: VPCs, subnets, route tables with CIDR blocks
- **Security & Defaults**: Security groups (ports, protocols, CIDR), IAM roles, encryption
- **Compute**: EC2 instances (type, AMI ID, availability zone)
- **Storage**: EBS volumes, S3 buckets (encryption, public access)
- **Tags**: Common tags applied

**SECTION 2: Impact-Analysis**
Format as markdown with these subsections:
- **🚨 Security Concerns**: Critical/High/Medium security issues (public access, open ports, unencrypted storage)
- **⚠️ Configuration Issues**: Missing tags, deprecated resources, configuration problems
- **📊 Operational Impact**: Infrastructure changes, availability impact, cost implications
- **💡 Recommendations**: Priority fixes and best practices

**SECTION 3: AMI-Summary**
Format as markdown with these subsections:
- **Current AMIs**: List any existing AMI IDs being replaced
- **New/Updated AMIs**: List new AMI IDs being deployed with descriptions
- **Validation**: Instance type validation, security assessment
- **Recommendations**: AMI update recommendations, security improvements

Resource Summary: {} to add, {} to change, {} to destroy

Terraform Plan: {}
"#,
        summary.add, summary.change, summary.destroy, changes
    )
}

/// Generates the narrative for a plan through a language backend
pub struct NarrativeWriter {
    backend: Arc<dyn LanguageBackend>,
    policy: RetryPolicy,
    logger: StructuredLogger,
    inspector: Option<GuardrailInspector>,
}

impl NarrativeWriter {
    pub fn new(backend: Arc<dyn LanguageBackend>, logger: StructuredLogger) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            logger,
            inspector: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run every response through the named guardrail before use
    pub fn with_guardrail(mut self, label: impl Into<String>) -> Self {
        self.inspector = Some(GuardrailInspector::new(
            Arc::clone(&self.backend),
            label,
            self.logger.child(),
        ));
        self
    }

    pub async fn write(&self, plan: &PlanDocument) -> Result<Narrative, LlmError> {
        let prompt = build_prompt(plan);
        let started = Instant::now();

        let attempted = retry_with_backoff(&self.policy, self.backend.model(), LlmError::is_retryable, || {
            self.backend.generate(SYSTEM_PROMPT, &prompt)
        })
        .await;
        let text = attempted.result?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.logger
            .log_llm_invocation(self.backend.model(), prompt.chars().count(), text.chars().count(), elapsed_ms);
        info!(
            model = %self.backend.model(),
            attempts = attempted.attempts,
            duration_ms = elapsed_ms,
            "Narrative generated"
        );

        if text.trim().is_empty() {
            let summary = plan.summary();
            return Ok(Narrative {
                plan_summary: format!(
                    "Analysis: {} resources to add, {} to change, {} to destroy",
                    summary.add, summary.change, summary.destroy
                ),
                ..Narrative::default()
            });
        }

        if let Some(inspector) = &self.inspector {
            if let Inspected::Blocked { notice } = inspector.inspect(&text, GuardrailMode::Output).await? {
                warn!("Narrative replaced by guardrail notice");
                return Ok(Narrative {
                    impact_analysis: notice,
                    ..Narrative::default()
                });
            }
        }

        Ok(Narrative::from_response(&text))
    }
}
