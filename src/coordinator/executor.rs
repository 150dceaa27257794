//! Runs validators with retry, per-validator isolation and a run deadline

use super::retry::{retry_with_backoff, Attempted, RetryPolicy};
use crate::error::{ErrorKind, ToolError};
use crate::models::{Finding, ToolOutput};
use crate::observability::{MetricsSink, StructuredLogger};
use crate::tools::ToolRegistry;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// One validator call: registered name plus its input record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub input: Value,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, input: Value) -> Self {
        Self {
            tool: tool.into(),
            input,
        }
    }
}

/// What happened to a single invocation
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub validator_name: String,
    pub output: ToolOutput,
    pub error_kind: Option<ErrorKind>,
    pub attempts: u32,
    pub duration_ms: f64,
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        self.output.success
    }

    fn failed(name: &str, kind: ErrorKind, error: String, attempts: u32, duration_ms: f64) -> Self {
        Self {
            validator_name: name.to_string(),
            output: ToolOutput::failed(error),
            error_kind: Some(kind),
            attempts,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    /// In invocation order; includes isolated failures
    pub outcomes: Vec<ToolOutcome>,
    /// The deadline fired before every invocation completed
    pub partial: bool,
    /// Invocations never started because of the deadline
    pub skipped: Vec<String>,
}

impl RunOutcome {
    /// Every finding from successful outcomes, in invocation order
    pub fn findings(&self) -> Vec<Finding> {
        self.outcomes
            .iter()
            .flat_map(|o| o.output.findings.iter().cloned())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ToolOutcome> {
        self.outcomes.iter().filter(|o| !o.success())
    }
}

pub struct ExecutionCoordinator {
    registry: Arc<ToolRegistry>,
    metrics: Arc<dyn MetricsSink>,
    logger: StructuredLogger,
    policy: RetryPolicy,
}

impl ExecutionCoordinator {
    pub fn new(registry: Arc<ToolRegistry>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            registry,
            metrics,
            logger: StructuredLogger::new(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run invocations sequentially
    ///
    /// Never fails: each invocation's error is recorded on its outcome. When
    /// `deadline` passes, the invocation in flight is abandoned, the rest are
    /// skipped, and the collected outcomes are returned tagged `partial`.
    pub async fn run(&self, invocations: &[ToolInvocation], deadline: Option<Instant>) -> RunOutcome {
        let mut run = RunOutcome::default();

        for (idx, invocation) in invocations.iter().enumerate() {
            if deadline.map(|d| Instant::now() >= d).unwrap_or(false) {
                run.partial = true;
                run.skipped = invocations[idx..].iter().map(|i| i.tool.clone()).collect();
                break;
            }

            let outcome = self.execute(invocation, deadline).await;
            let timed_out = outcome.error_kind == Some(ErrorKind::Timeout);
            run.outcomes.push(outcome);

            if timed_out {
                run.partial = true;
                run.skipped = invocations[idx + 1..].iter().map(|i| i.tool.clone()).collect();
                break;
            }
        }

        if run.partial {
            warn!(
                completed = run.outcomes.len(),
                skipped = run.skipped.len(),
                "Deadline reached, returning partial results"
            );
        }
        run
    }

    /// Execute one invocation with retry, isolating every failure
    pub async fn execute(&self, invocation: &ToolInvocation, deadline: Option<Instant>) -> ToolOutcome {
        let start = Instant::now();
        let name = invocation.tool.as_str();

        let outcome = match self.registry.get(name) {
            None => ToolOutcome::failed(
                name,
                ErrorKind::UnknownTool,
                format!("No validator registered under '{}'", name),
                0,
                0.0,
            ),
            Some(validator) => {
                let attempts = Arc::new(AtomicU32::new(0));
                let counter = Arc::clone(&attempts);
                let policy = self.policy.clone();
                let label = name.to_string();
                let input = invocation.input.clone();

                // Spawned so a panicking validator surfaces as a JoinError
                let mut handle = tokio::spawn(async move {
                    retry_with_backoff(&policy, &label, ToolError::is_retryable, || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        validator.execute(&input)
                    })
                    .await
                });

                let joined = match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(joined) => Some(joined),
                        Err(_) => {
                            handle.abort();
                            None
                        }
                    },
                    None => Some(handle.await),
                };

                let elapsed = elapsed_ms(start);
                match joined {
                    Some(Ok(Attempted {
                        result: Ok(findings),
                        attempts,
                    })) => ToolOutcome {
                        validator_name: name.to_string(),
                        output: ToolOutput::ok(findings),
                        error_kind: None,
                        attempts,
                        duration_ms: elapsed,
                    },
                    Some(Ok(Attempted {
                        result: Err(e),
                        attempts,
                    })) => {
                        let kind = if e.is_retryable() && attempts >= self.policy.max_attempts {
                            ErrorKind::RetryExhausted
                        } else {
                            e.kind()
                        };
                        ToolOutcome::failed(name, kind, format!("{} failed: {}", name, e), attempts, elapsed)
                    }
                    Some(Err(join_error)) => ToolOutcome::failed(
                        name,
                        ErrorKind::Internal,
                        format!("{} aborted: {}", name, join_error),
                        attempts.load(Ordering::SeqCst),
                        elapsed,
                    ),
                    None => ToolOutcome::failed(
                        name,
                        ErrorKind::Timeout,
                        format!("{} did not finish before the analysis deadline", name),
                        attempts.load(Ordering::SeqCst),
                        elapsed,
                    ),
                }
            }
        };

        self.record(&outcome);
        outcome
    }

    fn record(&self, outcome: &ToolOutcome) {
        let name = &outcome.validator_name;
        self.metrics
            .emit_tool_execution(name, outcome.success(), outcome.duration_ms);
        self.logger
            .log_tool_execution(name, outcome.success(), outcome.duration_ms, outcome.attempts);

        match (&outcome.error_kind, &outcome.output.error) {
            (Some(kind), Some(err)) => error!(
                tool = %name,
                error_kind = kind.as_str(),
                attempts = outcome.attempts,
                error = %err,
                "Validator failed"
            ),
            _ => info!(
                tool = %name,
                findings = outcome.output.findings.len(),
                attempts = outcome.attempts,
                duration_ms = outcome.duration_ms,
                "Validator completed"
            ),
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
