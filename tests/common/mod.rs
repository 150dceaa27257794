//! Common test helpers for integration tests
//!
//! Plan builders produce `terraform show -json` shaped documents, and the
//! scripted validators let coordinator tests control failures and timing.

#![allow(dead_code)]

use async_trait::async_trait;
use planguard::error::{ProviderError, ToolError};
use planguard::models::{Finding, PlanDocument, Severity};
use planguard::tools::Validator;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Builder for plan documents
///
/// # Examples
///
/// ```
/// let plan = TestPlan::new()
///     .bucket("logs", None, None)
///     .instance("web", "t3.micro", Some("t2.micro"))
///     .build();
/// ```
#[derive(Default)]
pub struct TestPlan {
    changes: Vec<Value>,
}

impl TestPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn change(mut self, resource_type: &str, name: &str, actions: &[&str], before: Value, after: Value) -> Self {
        self.changes.push(json!({
            "address": format!("{}.{}", resource_type, name),
            "type": resource_type,
            "name": name,
            "change": {"actions": actions, "before": before, "after": after}
        }));
        self
    }

    /// EC2 instance; an `old_type` makes it an in-place update
    pub fn instance(self, name: &str, instance_type: &str, old_type: Option<&str>) -> Self {
        match old_type {
            Some(old) => self.change(
                "aws_instance",
                name,
                &["update"],
                json!({"instance_type": old}),
                json!({"instance_type": instance_type, "availability_zone": "us-east-1a"}),
            ),
            None => self.change(
                "aws_instance",
                name,
                &["create"],
                Value::Null,
                json!({"instance_type": instance_type, "availability_zone": "us-east-1a"}),
            ),
        }
    }

    /// S3 bucket with optional public access block flags and SSE algorithm
    pub fn bucket(self, name: &str, block_all: Option<bool>, sse_algorithm: Option<&str>) -> Self {
        let mut after = json!({"bucket": name});
        if let Some(algorithm) = sse_algorithm {
            after["server_side_encryption_configuration"] = json!([{
                "rule": [{"apply_server_side_encryption_by_default": [{"sse_algorithm": algorithm}]}]
            }]);
        }
        let plan = self.change("aws_s3_bucket", name, &["create"], Value::Null, after);

        match block_all {
            Some(on) => plan.change(
                "aws_s3_bucket_public_access_block",
                name,
                &["create"],
                Value::Null,
                json!({
                    "bucket": name,
                    "block_public_acls": on,
                    "block_public_policy": on,
                    "ignore_public_acls": on,
                    "restrict_public_buckets": on
                }),
            ),
            None => plan,
        }
    }

    /// Security group with one ingress rule
    pub fn security_group(self, name: &str, from_port: i64, to_port: i64, cidr: &str) -> Self {
        self.change(
            "aws_security_group",
            name,
            &["create"],
            Value::Null,
            json!({
                "name": name,
                "ingress": [{"from_port": from_port, "to_port": to_port, "protocol": "tcp", "cidr_blocks": [cidr]}],
                "egress": []
            }),
        )
    }

    pub fn value(&self) -> Value {
        json!({"format_version": "1.2", "resource_changes": self.changes})
    }

    pub fn json(&self) -> String {
        self.value().to_string()
    }

    pub fn build(&self) -> PlanDocument {
        PlanDocument::from_value(self.value()).unwrap()
    }
}

pub fn finding(severity: Severity, title: &str) -> Finding {
    Finding::new(
        severity,
        title,
        format!("{} security issue", title),
        "aws_s3_bucket.test",
        "Fix the configuration",
    )
}

/// Validator that returns scripted errors before succeeding
pub struct ScriptedValidator {
    name: String,
    failures: Mutex<Vec<ToolError>>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl ScriptedValidator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failures: Mutex::new(Vec::new()),
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing_with(self, errors: Vec<ToolError>) -> Self {
        *self.failures.lock().unwrap() = errors;
        self
    }

    /// Fails with a retryable throttling error `n` times
    pub fn throttled(self, n: usize) -> Self {
        let errors = (0..n)
            .map(|_| ToolError::Provider(ProviderError::new("ThrottlingException", "Rate exceeded")))
            .collect();
        self.failing_with(errors)
    }

    /// Fails with a non-retryable error on every call
    pub fn always_invalid(self) -> Self {
        let errors = (0..10)
            .map(|_| ToolError::InvalidInput("missing required field 'bucket_name'".into()))
            .collect();
        self.failing_with(errors)
    }

    pub fn sleeping(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Scripted validator for tests"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _input: &Value) -> Result<Vec<Finding>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = {
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                None
            } else {
                Some(failures.remove(0))
            }
        };
        match next {
            Some(err) => Err(err),
            None => Ok(vec![finding(Severity::Medium, &format!("{} finding", self.name))]),
        }
    }
}
