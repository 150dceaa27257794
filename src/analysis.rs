//! Plan analysis: extract validator inputs, run them, build the report
//!
//! `run_plan_analysis` is the entry point used by the outer handler. Only a
//! plan document that cannot be parsed is a hard failure; every other problem
//! is isolated and reported inside the returned segments.

use crate::cloud::{AmiLookup, AvailabilityLookup, PriceLookup, StaticCatalog};
use crate::config::{AnalyzerConfig, Enforcement};
use crate::coordinator::{ExecutionCoordinator, RetryPolicy, RunOutcome, ToolInvocation};
use crate::error::{AnalysisError, LlmError};
use crate::formatter::{bound_text, char_len, OutputFormatter};
use crate::llm::{HttpLanguageBackend, Narrative, NarrativeWriter};
use crate::models::{
    CostAnalysis, CostComparison, Finding, PlanDocument, ReportSegment, ResourceChange, RunStatus, RunTaskResult,
    Severity,
};
use crate::observability::metrics::RUN_TASK_DURATION;
use crate::observability::{MetricsSink, StructuredLogger};
use crate::tools::{
    ComputeValidator, CostEstimator, NetworkValidator, StorageValidator, ToolRegistry, Validator, COMPUTE_VALIDATOR,
    COST_ESTIMATOR, NETWORK_VALIDATOR, STORAGE_VALIDATOR,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub const PLAN_SUMMARY_ID: &str = "plan-summary";
pub const IMPACT_ANALYSIS_ID: &str = "impact-analysis";
pub const COMPUTE_SUMMARY_ID: &str = "compute-summary";
pub const TIMEOUT_WARNING_ID: &str = "timeout-warning";

const SEGMENT_SEPARATOR: &str = "\n\n";

/// Longest validator error quoted in the failure note
const MAX_ERROR_CHARS: usize = 200;

/// `us-east-1a` -> `us-east-1`
static AVAILABILITY_ZONE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^([a-z]{2}(?:-gov)?-[a-z]+-\d+)[a-z]$").ok());

pub fn region_from_zone(zone: &str) -> Option<String> {
    AVAILABILITY_ZONE
        .as_ref()?
        .captures(zone)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Capability lookups the validators are wired to
#[derive(Clone)]
pub struct Collaborators {
    pub availability: Arc<dyn AvailabilityLookup>,
    pub prices: Arc<dyn PriceLookup>,
    pub amis: Arc<dyn AmiLookup>,
}

impl Collaborators {
    pub fn from_catalog(catalog: StaticCatalog) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            availability: catalog.clone(),
            prices: catalog.clone(),
            amis: catalog,
        }
    }

    /// Built-in tables only, no network access
    pub fn offline() -> Self {
        Self::from_catalog(StaticCatalog::new())
    }
}

/// Register the four validators in invocation order
///
/// A validator that fails registration is logged and left out; the rest of
/// the registry is still usable.
pub fn default_registry(collaborators: &Collaborators) -> ToolRegistry {
    let registry = ToolRegistry::new();
    let validators: Vec<Arc<dyn Validator>> = vec![
        Arc::new(ComputeValidator::new(
            Arc::clone(&collaborators.availability),
            Arc::clone(&collaborators.amis),
        )),
        Arc::new(StorageValidator::new()),
        Arc::new(NetworkValidator::new()),
        Arc::new(CostEstimator::new(Arc::clone(&collaborators.prices))),
    ];

    for validator in validators {
        let name = validator.name().to_string();
        match registry.register(validator) {
            Ok(()) => debug!(tool = %name, "Registered validator"),
            Err(e) => error!(tool = %name, error = %e, "Failed to register validator"),
        }
    }
    registry
}

/// A compute resource whose cost goes into the comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeChange {
    pub address: String,
    pub instance_type: String,
    pub old_instance_type: Option<String>,
    pub region: String,
}

/// Validator inputs derived from one plan document
#[derive(Debug, Clone, Default)]
pub struct PlanInputs {
    pub invocations: Vec<ToolInvocation>,
    pub compute: Vec<ComputeChange>,
}

impl PlanInputs {
    /// Reorder invocations to follow `order`; tools not listed go last
    pub fn ordered_by(mut self, order: &[String]) -> Self {
        let rank = |tool: &str| order.iter().position(|n| n == tool).unwrap_or(order.len());
        self.invocations.sort_by_key(|inv| rank(&inv.tool));
        self
    }
}

/// Build validator invocations for every live resource the validators cover
pub fn extract_inputs(plan: &PlanDocument, config: &AnalyzerConfig) -> PlanInputs {
    let mut inputs = PlanInputs::default();

    for rc in plan.changes_of_type("aws_instance") {
        let Some(instance_type) = rc.change.after_str("instance_type") else {
            debug!(address = %rc.address, "Instance type unknown until apply, skipping");
            continue;
        };
        let region = rc
            .change
            .after_str("availability_zone")
            .and_then(region_from_zone)
            .unwrap_or_else(|| config.region.clone());
        let old_instance_type = rc
            .change
            .before_str("instance_type")
            .filter(|old| *old != instance_type)
            .map(str::to_string);

        inputs.invocations.push(ToolInvocation::new(
            COMPUTE_VALIDATOR,
            json!({
                "instance_type": instance_type,
                "region": region,
                "ami_id": rc.change.after_str("ami"),
                "resource_address": rc.address,
            }),
        ));
        inputs.invocations.push(ToolInvocation::new(
            COST_ESTIMATOR,
            json!({
                "instance_type": instance_type,
                "region": region,
                "hours_per_month": config.hours_per_month,
                "old_instance_type": old_instance_type,
                "resource_address": rc.address,
            }),
        ));
        inputs.compute.push(ComputeChange {
            address: rc.address.clone(),
            instance_type: instance_type.to_string(),
            old_instance_type,
            region,
        });
    }

    for rc in plan.changes_of_type("aws_s3_bucket") {
        inputs
            .invocations
            .push(ToolInvocation::new(STORAGE_VALIDATOR, storage_input(plan, rc)));
    }

    for rc in plan.changes_of_type("aws_security_group") {
        let group_name = rc.change.after_str("name").unwrap_or(&rc.name);
        inputs.invocations.push(ToolInvocation::new(
            NETWORK_VALIDATOR,
            json!({
                "security_group_name": group_name,
                "ingress_rules": rules(rc.change.after_field("ingress")),
                "egress_rules": rules(rc.change.after_field("egress")),
                "resource_address": rc.address,
            }),
        ));
    }

    inputs
}

fn storage_input(plan: &PlanDocument, bucket: &ResourceChange) -> Value {
    let bucket_name = bucket.change.after_str("bucket").unwrap_or(&bucket.name);
    let companion = |resource_type: &'static str| {
        plan.present_of_type(resource_type).find(|rc| {
            rc.change.after_str("bucket") == Some(bucket_name) || (!rc.name.is_empty() && rc.name == bucket.name)
        })
    };

    let public_access_block = companion("aws_s3_bucket_public_access_block").map(|rc| {
        let flag = |key: &str| {
            rc.change
                .after_field(key)
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        json!({
            "block_public_acls": flag("block_public_acls"),
            "block_public_policy": flag("block_public_policy"),
            "ignore_public_acls": flag("ignore_public_acls"),
            "restrict_public_buckets": flag("restrict_public_buckets"),
        })
    });

    let encryption = bucket
        .change
        .after_field("server_side_encryption_configuration")
        .and_then(|inline| inline.pointer("/0/rule/0/apply_server_side_encryption_by_default/0"))
        .or_else(|| {
            companion("aws_s3_bucket_server_side_encryption_configuration")
                .and_then(|rc| rc.change.after.as_ref())
                .and_then(|after| after.pointer("/rule/0/apply_server_side_encryption_by_default/0"))
        })
        .map(|sse| {
            let text = |key: &str| sse.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
            json!({
                "sse_algorithm": text("sse_algorithm"),
                "kms_master_key_id": text("kms_master_key_id"),
            })
        });

    json!({
        "bucket_name": bucket_name,
        "public_access_block": public_access_block,
        "encryption": encryption,
        "resource_address": bucket.address,
    })
}

fn rules(value: Option<&Value>) -> Vec<Value> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .map(|rule| {
            let mut out = Map::new();
            for key in ["from_port", "to_port", "protocol", "cidr_blocks"] {
                if let Some(v) = rule.get(key).filter(|v| !v.is_null()) {
                    out.insert(key.to_string(), v.clone());
                }
            }
            Value::Object(out)
        })
        .collect()
}

pub struct PlanAnalyzer {
    config: AnalyzerConfig,
    coordinator: ExecutionCoordinator,
    cost: CostEstimator,
    metrics: Arc<dyn MetricsSink>,
    logger: StructuredLogger,
    narrative: Option<NarrativeWriter>,
}

impl PlanAnalyzer {
    pub fn new(config: AnalyzerConfig, collaborators: &Collaborators, metrics: Arc<dyn MetricsSink>) -> Self {
        let registry = Arc::new(default_registry(collaborators));
        Self::with_registry(config, registry, Arc::clone(&collaborators.prices), metrics)
    }

    /// Analyzer over an already populated registry
    pub fn with_registry(
        config: AnalyzerConfig,
        registry: Arc<ToolRegistry>,
        prices: Arc<dyn PriceLookup>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let logger = StructuredLogger::new();
        let coordinator = ExecutionCoordinator::new(registry, Arc::clone(&metrics)).with_logger(logger.child());
        Self {
            config,
            coordinator,
            cost: CostEstimator::new(prices),
            metrics,
            logger,
            narrative: None,
        }
    }

    /// Full analyzer from configuration, with the narrative backend when one is set
    pub fn from_config(
        config: AnalyzerConfig,
        collaborators: &Collaborators,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, LlmError> {
        let llm = config.llm.clone();
        let mut analyzer = Self::new(config, collaborators, metrics);
        if let Some(llm) = llm {
            let backend = Arc::new(HttpLanguageBackend::new(&llm)?);
            let mut writer = NarrativeWriter::new(backend, analyzer.logger.child());
            if let Some(guardrail_id) = &llm.guardrail_id {
                writer = writer.with_guardrail(guardrail_id.clone());
            }
            analyzer = analyzer.with_narrative(writer);
        }
        Ok(analyzer)
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.coordinator = self.coordinator.with_policy(policy);
        self
    }

    pub fn with_narrative(mut self, writer: NarrativeWriter) -> Self {
        self.narrative = Some(writer);
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.coordinator.registry()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze a plan given as JSON text
    ///
    /// # Errors
    /// Returns `AnalysisError::PlanParse` when the text is not a plan document.
    pub async fn run_plan_analysis(&self, plan_json: &str, deadline: Option<Instant>) -> Result<RunTaskResult, AnalysisError> {
        let plan = PlanDocument::from_json(plan_json).map_err(|e| {
            self.logger
                .log_error("plan_parse", &e.to_string(), json!({"stage": "analysis"}));
            AnalysisError::PlanParse(e)
        })?;
        Ok(self.analyze(&plan, deadline).await)
    }

    /// Analyze a parsed plan; never fails
    ///
    /// `deadline` defaults to now + the configured deadline.
    pub async fn analyze(&self, plan: &PlanDocument, deadline: Option<Instant>) -> RunTaskResult {
        let started = Instant::now();
        let deadline = deadline.unwrap_or(started + self.config.deadline);
        let run_id = self.logger.correlation_id().to_string();
        self.logger.log_run_task(&run_id, "analysis", "started", None);

        let inputs = extract_inputs(plan, &self.config).ordered_by(&self.registry().list());
        info!(
            invocations = inputs.invocations.len(),
            compute_resources = inputs.compute.len(),
            "Running validators"
        );

        let run = self.coordinator.run(&inputs.invocations, Some(deadline)).await;

        let cost = if run.partial {
            None
        } else {
            match tokio::time::timeout_at(deadline, self.cost_analysis(&inputs.compute)).await {
                Ok(cost) => Some(cost),
                Err(_) => {
                    warn!("Deadline reached while building cost table");
                    None
                }
            }
        };

        let narrative = if run.partial {
            None
        } else {
            self.write_narrative(plan, deadline).await
        };

        let result = self.build_result(plan, &run, cost.as_ref(), narrative.as_ref());

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .emit_duration(RUN_TASK_DURATION, elapsed_ms, &[("Status", result.status.as_str())]);
        self.logger
            .log_run_task(&run_id, "analysis", result.status.as_str(), Some(elapsed_ms));
        info!(
            status = result.status.as_str(),
            enforcement = self.config.enforcement.as_str(),
            partial = result.partial,
            duration_ms = elapsed_ms,
            "Plan analysis complete"
        );
        result
    }

    /// Old and new monthly cost for every compute resource
    pub async fn cost_analysis(&self, compute: &[ComputeChange]) -> CostAnalysis {
        let hours = self.config.hours_per_month;
        let mut table = CostAnalysis::default();
        for change in compute {
            let new_cost = self.cost.monthly_cost(&change.instance_type, &change.region, hours).await;
            let current_cost = match &change.old_instance_type {
                Some(old) => self.cost.monthly_cost(old, &change.region, hours).await,
                None => 0.0,
            };
            table.push(CostComparison::new(change.address.clone(), current_cost, new_cost));
        }
        table
    }

    async fn write_narrative(&self, plan: &PlanDocument, deadline: Instant) -> Option<Narrative> {
        let writer = self.narrative.as_ref()?;
        match tokio::time::timeout_at(deadline, writer.write(plan)).await {
            Ok(Ok(narrative)) => Some(narrative),
            Ok(Err(e)) => {
                warn!(error = %e, "Narrative unavailable, continuing with validator findings");
                self.logger
                    .log_error("narrative", &e.to_string(), json!({"retryable": e.is_retryable()}));
                None
            }
            Err(_) => {
                warn!("Deadline reached while generating narrative");
                None
            }
        }
    }

    fn build_result(
        &self,
        plan: &PlanDocument,
        run: &RunOutcome,
        cost: Option<&CostAnalysis>,
        narrative: Option<&Narrative>,
    ) -> RunTaskResult {
        let max = self.config.max_segment_chars;
        let findings = run.findings();
        let compute_findings: Vec<Finding> = run
            .outcomes
            .iter()
            .filter(|o| o.validator_name == COMPUTE_VALIDATOR || o.validator_name == COST_ESTIMATOR)
            .flat_map(|o| o.output.findings.iter().cloned())
            .collect();
        let compute_incomplete = run.partial
            || run
                .failures()
                .any(|o| o.validator_name == COMPUTE_VALIDATOR || o.validator_name == COST_ESTIMATOR);

        let mut results = vec![
            ReportSegment::new(
                PLAN_SUMMARY_ID,
                "📋 Plan-Summary",
                compose(
                    max,
                    narrative.map(|n| n.plan_summary.as_str()),
                    &plan_overview(plan, run),
                    "",
                ),
            ),
            ReportSegment::new(
                IMPACT_ANALYSIS_ID,
                "🔍 Impact-Analysis",
                compose_report(
                    max,
                    narrative.map(|n| n.impact_analysis.as_str()),
                    &findings,
                    cost,
                    &failure_note(run),
                    run.partial || run.failures().next().is_some(),
                ),
            ),
            ReportSegment::new(
                COMPUTE_SUMMARY_ID,
                "🖥️ Compute-Summary",
                compose_report(
                    max,
                    narrative.map(|n| n.ami_summary.as_str()),
                    &compute_findings,
                    cost,
                    "",
                    compute_incomplete,
                ),
            ),
        ];

        if run.partial {
            results.push(ReportSegment::new(
                TIMEOUT_WARNING_ID,
                "⏱️ Timeout-Warning",
                bound_text(&timeout_warning(run), max),
            ));
        }

        let critical = findings.iter().filter(|f| f.severity == Severity::Critical).count();
        let high = findings.iter().filter(|f| f.severity == Severity::High).count();

        let status = if self.config.enforcement == Enforcement::Mandatory && critical > 0 && !run.partial {
            RunStatus::Failed
        } else {
            RunStatus::Passed
        };

        let message = if run.partial {
            format!(
                "Partial results: analysis deadline reached after {} of {} validator runs; {} findings so far ({} critical, {} high)",
                run.outcomes.len(),
                run.outcomes.len() + run.skipped.len(),
                findings.len(),
                critical,
                high
            )
        } else if status == RunStatus::Failed {
            format!("Plan blocked: {} critical findings under mandatory enforcement", critical)
        } else {
            format!(
                "Analysis complete: {} findings ({} critical, {} high)",
                findings.len(),
                critical,
                high
            )
        };

        RunTaskResult {
            status,
            message,
            results,
            partial: run.partial,
        }
    }
}

/// Status returned to the outer handler when the plan cannot be analyzed at all
pub fn degraded_result(error: &AnalysisError) -> RunTaskResult {
    RunTaskResult {
        status: RunStatus::Passed,
        message: format!("Analysis skipped: {}", error),
        results: Vec::new(),
        partial: false,
    }
}

fn plan_overview(plan: &PlanDocument, run: &RunOutcome) -> String {
    let summary = plan.summary();
    let mut out = String::from("## 📋 Plan Overview\n\n");
    out.push_str(&format!(
        "**Resource changes**: {} to add, {} to change, {} to destroy\n",
        summary.add, summary.change, summary.destroy
    ));

    let completed = run.outcomes.iter().filter(|o| o.success()).count();
    out.push_str(&format!(
        "\n**Validators**: {} of {} checks completed\n",
        completed,
        run.outcomes.len() + run.skipped.len()
    ));
    out
}

fn failure_note(run: &RunOutcome) -> String {
    let failures: Vec<_> = run.failures().collect();
    if failures.is_empty() {
        return String::new();
    }

    let mut note = String::from("### ⚠️ Validator Failures\n\n");
    for outcome in failures {
        let kind = outcome.error_kind.map(|k| k.as_str()).unwrap_or("internal");
        let error = outcome.output.error.as_deref().unwrap_or("unknown error");
        let error: String = error.chars().take(MAX_ERROR_CHARS).collect();
        note.push_str(&format!(
            "- **{}** could not complete ({}): {}\n",
            outcome.validator_name, kind, error
        ));
    }
    note
}

fn timeout_warning(run: &RunOutcome) -> String {
    let mut out = String::from("⏱️ The analysis deadline was reached before every validator finished. ");
    out.push_str("Findings above are partial.\n");
    if !run.skipped.is_empty() {
        out.push_str(&format!("\n**Not run**: {}\n", run.skipped.join(", ")));
    }
    out
}

/// Findings report plus optional narrative and trailing note, within `max`
///
/// The note and the findings report take priority; the narrative gets
/// whatever room is left.
fn compose_report(
    max: usize,
    narrative: Option<&str>,
    findings: &[Finding],
    cost: Option<&CostAnalysis>,
    note: &str,
    incomplete: bool,
) -> String {
    let note = bound_text(note, max / 4);
    let reserved = if note.is_empty() {
        0
    } else {
        char_len(&note) + char_len(SEGMENT_SEPARATOR)
    };
    let report = OutputFormatter::with_max_length(max.saturating_sub(reserved))
        .incomplete(incomplete)
        .format(findings, cost);
    compose(max, narrative, &report, &note)
}

/// Join narrative, body and note, cutting only the narrative to fit
fn compose(max: usize, narrative: Option<&str>, body: &str, note: &str) -> String {
    let mut tail = body.to_string();
    if !note.is_empty() {
        tail.push_str(SEGMENT_SEPARATOR);
        tail.push_str(note);
    }

    let narrative = narrative.map(str::trim).filter(|n| !n.is_empty());
    let body = match narrative {
        Some(text) => {
            let room = max.saturating_sub(char_len(&tail) + char_len(SEGMENT_SEPARATOR));
            if room > char_len("\n\n*Output truncated due to length constraints*\n") {
                format!("{}{}{}", bound_text(text, room), SEGMENT_SEPARATOR, tail)
            } else {
                tail
            }
        }
        None => tail,
    };

    if char_len(&body) > max {
        bound_text(&body, max)
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::InMemoryMetrics;

    fn plan(changes: Value) -> PlanDocument {
        PlanDocument::from_value(json!({ "resource_changes": changes })).unwrap()
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-east-1a").as_deref(), Some("us-east-1"));
        assert_eq!(region_from_zone("us-gov-west-1b").as_deref(), Some("us-gov-west-1"));
        assert_eq!(region_from_zone("not-a-zone"), None);
    }

    #[test]
    fn test_extract_compute_and_cost_inputs() {
        let doc = plan(json!([{
            "address": "aws_instance.web",
            "type": "aws_instance",
            "name": "web",
            "change": {
                "actions": ["update"],
                "before": {"instance_type": "t2.micro"},
                "after": {"instance_type": "t3.large", "ami": "ami-123", "availability_zone": "eu-west-1b"}
            }
        }]));

        let inputs = extract_inputs(&doc, &AnalyzerConfig::default());
        assert_eq!(inputs.invocations.len(), 2);
        assert_eq!(inputs.invocations[0].tool, COMPUTE_VALIDATOR);
        assert_eq!(inputs.invocations[0].input["region"], "eu-west-1");
        assert_eq!(inputs.invocations[0].input["ami_id"], "ami-123");
        assert_eq!(inputs.invocations[1].input["old_instance_type"], "t2.micro");
        assert_eq!(inputs.invocations[1].input["hours_per_month"], 730.0);
        assert_eq!(
            inputs.compute,
            vec![ComputeChange {
                address: "aws_instance.web".into(),
                instance_type: "t3.large".into(),
                old_instance_type: Some("t2.micro".into()),
                region: "eu-west-1".into(),
            }]
        );
    }

    #[test]
    fn test_unchanged_instance_type_has_no_old_type() {
        let doc = plan(json!([{
            "address": "aws_instance.web", "type": "aws_instance", "name": "web",
            "change": {"actions": ["update"], "before": {"instance_type": "t3.micro"}, "after": {"instance_type": "t3.micro"}}
        }]));
        let inputs = extract_inputs(&doc, &AnalyzerConfig::default());
        assert!(inputs.invocations[1].input["old_instance_type"].is_null());
        assert_eq!(inputs.invocations[0].input["region"], "us-east-1");
    }

    #[test]
    fn test_bucket_companions_matched_by_name() {
        let doc = plan(json!([
            {"address": "aws_s3_bucket.logs", "type": "aws_s3_bucket", "name": "logs",
             "change": {"actions": ["create"], "after": {"bucket": "acme-logs"}}},
            {"address": "aws_s3_bucket_public_access_block.logs", "type": "aws_s3_bucket_public_access_block", "name": "logs",
             "change": {"actions": ["create"], "after": {"bucket": null, "block_public_acls": true, "block_public_policy": false,
                        "ignore_public_acls": true, "restrict_public_buckets": true}}},
            {"address": "aws_s3_bucket_server_side_encryption_configuration.x", "type": "aws_s3_bucket_server_side_encryption_configuration", "name": "x",
             "change": {"actions": ["create"], "after": {"bucket": "acme-logs",
                        "rule": [{"apply_server_side_encryption_by_default": [{"sse_algorithm": "aws:kms", "kms_master_key_id": ""}]}]}}}
        ]));

        let inputs = extract_inputs(&doc, &AnalyzerConfig::default());
        assert_eq!(inputs.invocations.len(), 1);
        let input = &inputs.invocations[0].input;
        assert_eq!(input["bucket_name"], "acme-logs");
        assert_eq!(input["public_access_block"]["block_public_policy"], false);
        assert_eq!(input["encryption"]["sse_algorithm"], "aws:kms");
        assert!(input["encryption"]["kms_master_key_id"].is_null());
    }

    #[test]
    fn test_unchanged_companions_still_count() {
        let doc = plan(json!([
            {"address": "aws_s3_bucket.logs", "type": "aws_s3_bucket", "name": "logs",
             "change": {"actions": ["update"], "before": {"bucket": "logs"}, "after": {"bucket": "logs", "tags": {"team": "ops"}}}},
            {"address": "aws_s3_bucket_public_access_block.logs", "type": "aws_s3_bucket_public_access_block", "name": "logs",
             "change": {"actions": ["no-op"], "after": {"bucket": "logs", "block_public_acls": true, "block_public_policy": true,
                        "ignore_public_acls": true, "restrict_public_buckets": true}}},
            {"address": "aws_s3_bucket_server_side_encryption_configuration.logs", "type": "aws_s3_bucket_server_side_encryption_configuration", "name": "logs",
             "change": {"actions": ["no-op"], "after": {"bucket": "logs",
                        "rule": [{"apply_server_side_encryption_by_default": [{"sse_algorithm": "AES256"}]}]}}}
        ]));

        let inputs = extract_inputs(&doc, &AnalyzerConfig::default());
        assert_eq!(inputs.invocations.len(), 1);
        let input = &inputs.invocations[0].input;
        assert_eq!(input["public_access_block"]["block_public_acls"], true);
        assert_eq!(input["public_access_block"]["restrict_public_buckets"], true);
        assert_eq!(input["encryption"]["sse_algorithm"], "AES256");
    }

    #[test]
    fn test_deleted_companion_is_ignored() {
        let doc = plan(json!([
            {"address": "aws_s3_bucket.logs", "type": "aws_s3_bucket", "name": "logs",
             "change": {"actions": ["update"], "after": {"bucket": "logs"}}},
            {"address": "aws_s3_bucket_public_access_block.logs", "type": "aws_s3_bucket_public_access_block", "name": "logs",
             "change": {"actions": ["delete"], "before": {"bucket": "logs", "block_public_acls": true}, "after": null}}
        ]));
        let input = &extract_inputs(&doc, &AnalyzerConfig::default()).invocations[0].input;
        assert!(input["public_access_block"].is_null());
    }

    #[test]
    fn test_inline_encryption_and_missing_block() {
        let doc = plan(json!([
            {"address": "aws_s3_bucket.data", "type": "aws_s3_bucket", "name": "data",
             "change": {"actions": ["create"], "after": {"bucket": "data",
                "server_side_encryption_configuration": [{"rule": [{"apply_server_side_encryption_by_default": [{"sse_algorithm": "AES256"}]}]}]}}}
        ]));
        let input = &extract_inputs(&doc, &AnalyzerConfig::default()).invocations[0].input;
        assert!(input["public_access_block"].is_null());
        assert_eq!(input["encryption"]["sse_algorithm"], "AES256");
    }

    #[test]
    fn test_deleted_and_noop_resources_skipped() {
        let doc = plan(json!([
            {"address": "aws_s3_bucket.old", "type": "aws_s3_bucket", "name": "old",
             "change": {"actions": ["delete"], "before": {"bucket": "old"}}},
            {"address": "aws_security_group.same", "type": "aws_security_group", "name": "same",
             "change": {"actions": ["no-op"], "after": {"name": "same"}}}
        ]));
        assert!(extract_inputs(&doc, &AnalyzerConfig::default()).invocations.is_empty());
    }

    #[test]
    fn test_security_group_rules_extracted() {
        let doc = plan(json!([{
            "address": "aws_security_group.web", "type": "aws_security_group", "name": "web",
            "change": {"actions": ["create"], "after": {"name": "web-sg",
                "ingress": [{"from_port": 22, "to_port": 22, "protocol": "tcp", "cidr_blocks": ["0.0.0.0/0"], "description": "ssh"}],
                "egress": [{"from_port": 0, "to_port": 0, "protocol": "-1", "cidr_blocks": ["0.0.0.0/0"]}]}}
        }]));
        let input = &extract_inputs(&doc, &AnalyzerConfig::default()).invocations[0].input;
        assert_eq!(input["security_group_name"], "web-sg");
        assert_eq!(input["ingress_rules"][0]["from_port"], 22);
        assert!(input["ingress_rules"][0].get("description").is_none());
        assert_eq!(input["egress_rules"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_invocations_follow_registry_order() {
        let doc = plan(json!([
            {"address": "aws_security_group.a", "type": "aws_security_group", "name": "a",
             "change": {"actions": ["create"], "after": {"name": "a"}}},
            {"address": "aws_s3_bucket.b", "type": "aws_s3_bucket", "name": "b",
             "change": {"actions": ["create"], "after": {"bucket": "b"}}},
            {"address": "aws_instance.c", "type": "aws_instance", "name": "c",
             "change": {"actions": ["create"], "after": {"instance_type": "t3.micro"}}}
        ]));
        let registry = default_registry(&Collaborators::offline());
        let inputs = extract_inputs(&doc, &AnalyzerConfig::default()).ordered_by(&registry.list());
        let tools: Vec<&str> = inputs.invocations.iter().map(|i| i.tool.as_str()).collect();
        assert_eq!(tools, vec![COMPUTE_VALIDATOR, STORAGE_VALIDATOR, NETWORK_VALIDATOR, COST_ESTIMATOR]);
    }

    #[test]
    fn test_compose_keeps_body_and_cuts_narrative() {
        let body = "B".repeat(80);
        let narrative = (0..50).map(|i| format!("line {}\n", i)).collect::<String>();
        let out = compose(200, Some(&narrative), &body, "");
        assert!(char_len(&out) <= 200);
        assert!(out.ends_with(&body));
        assert!(out.contains("Output truncated"));
    }

    #[test]
    fn test_compose_drops_narrative_without_room() {
        let body = "B".repeat(190);
        let out = compose(200, Some("some narrative"), &body, "");
        assert_eq!(out, body);
    }

    #[tokio::test]
    async fn test_empty_plan_is_all_clear() {
        let analyzer = PlanAnalyzer::new(
            AnalyzerConfig::default(),
            &Collaborators::offline(),
            Arc::new(InMemoryMetrics::new()),
        );
        let result = analyzer.run_plan_analysis(r#"{"resource_changes": []}"#, None).await.unwrap();

        assert_eq!(result.status, RunStatus::Passed);
        assert!(!result.partial);
        assert_eq!(result.results.len(), 3);
        assert!(result.segment(IMPACT_ANALYSIS_ID).unwrap().body.contains("All Clear"));
    }

    #[tokio::test]
    async fn test_unparseable_plan_is_hard_failure() {
        let analyzer = PlanAnalyzer::new(
            AnalyzerConfig::default(),
            &Collaborators::offline(),
            Arc::new(InMemoryMetrics::new()),
        );
        let err = analyzer.run_plan_analysis("not json", None).await.unwrap_err();
        let degraded = degraded_result(&err);
        assert_eq!(degraded.status, RunStatus::Passed);
        assert!(degraded.message.contains("could not parse"));
    }
}
