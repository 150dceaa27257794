//! Structured JSON event logging with correlation ids

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

/// Emits one JSON object per event under target `planguard::events`
///
/// Every entry carries the logger's correlation id so a whole run can be
/// traced across validators and backend calls.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    correlation_id: String,
}

impl StructuredLogger {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// New logger sharing this logger's correlation id
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// Build the JSON entry for an event without emitting it
    pub fn entry(&self, event_type: &str, fields: Value) -> Value {
        let mut entry = Map::new();
        entry.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        entry.insert("correlation_id".into(), json!(self.correlation_id));
        entry.insert("event_type".into(), json!(event_type));
        if let Value::Object(extra) = fields {
            for (k, v) in extra {
                entry.insert(k, v);
            }
        }
        Value::Object(entry)
    }

    pub fn log(&self, event_type: &str, fields: Value) {
        let entry = self.entry(event_type, fields);
        info!(target: "planguard::events", "{}", entry);
    }

    pub fn log_run_task(&self, run_id: &str, stage: &str, status: &str, duration_ms: Option<f64>) {
        self.log(
            "run_task_execution",
            json!({
                "run_id": run_id,
                "stage": stage,
                "status": status,
                "duration_ms": duration_ms,
            }),
        );
    }

    pub fn log_tool_execution(&self, tool: &str, success: bool, duration_ms: f64, attempts: u32) {
        self.log(
            "tool_execution",
            json!({
                "tool_name": tool,
                "success": success,
                "duration_ms": duration_ms,
                "attempts": attempts,
            }),
        );
    }

    pub fn log_llm_invocation(&self, model: &str, prompt_chars: usize, response_chars: usize, duration_ms: f64) {
        self.log(
            "llm_invocation",
            json!({
                "model_id": model,
                "prompt_chars": prompt_chars,
                "response_chars": response_chars,
                "duration_ms": duration_ms,
            }),
        );
    }

    pub fn log_guardrail_violation(&self, guardrail_id: &str, violations: &[String]) {
        self.log(
            "guardrail_violation",
            json!({
                "guardrail_id": guardrail_id,
                "violations": violations,
            }),
        );
    }

    pub fn log_error(&self, error_type: &str, message: &str, context: Value) {
        self.log(
            "error",
            json!({
                "error_type": error_type,
                "error_message": message,
                "context": context,
            }),
        );
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::new()
    }
}
