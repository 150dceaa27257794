//! Fire-and-forget metric sinks
//!
//! Sinks never return errors. A sink that cannot deliver an event drops it.

use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

pub const DEFAULT_NAMESPACE: &str = "TerraformRunTask";

pub const TOOL_EXECUTION_SUCCESS: &str = "ToolExecutionSuccess";
pub const TOOL_EXECUTION_FAILURE: &str = "ToolExecutionFailure";
pub const TOOL_EXECUTION_DURATION: &str = "ToolExecutionDuration";
pub const RUN_TASK_DURATION: &str = "RunTaskDuration";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum MetricUnit {
    Milliseconds,
    Count,
}

/// A single emitted datapoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricEvent {
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    pub tags: Vec<(String, String)>,
}

impl MetricEvent {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

pub trait MetricsSink: Send + Sync {
    fn emit_duration(&self, name: &str, ms: f64, tags: &[(&str, &str)]);

    fn emit_count(&self, name: &str, n: u64, tags: &[(&str, &str)]);

    /// Success or failure count plus duration for one validator execution
    fn emit_tool_execution(&self, tool: &str, success: bool, ms: f64) {
        let tags = [("ToolName", tool)];
        let outcome = if success {
            TOOL_EXECUTION_SUCCESS
        } else {
            TOOL_EXECUTION_FAILURE
        };
        self.emit_count(outcome, 1, &tags);
        self.emit_duration(TOOL_EXECUTION_DURATION, ms, &tags);
    }
}

fn owned_tags(tags: &[(&str, &str)]) -> Vec<(String, String)> {
    tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Writes metrics as tracing events under `planguard::metrics`
#[derive(Debug, Clone)]
pub struct TracingMetrics {
    namespace: String,
}

impl TracingMetrics {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn emit(&self, event: MetricEvent) {
        let tags = serde_json::to_string(&event.tags).unwrap_or_default();
        info!(
            target: "planguard::metrics",
            namespace = %self.namespace,
            metric = %event.name,
            value = event.value,
            unit = ?event.unit,
            tags = %tags,
            "metric"
        );
    }
}

impl Default for TracingMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl MetricsSink for TracingMetrics {
    fn emit_duration(&self, name: &str, ms: f64, tags: &[(&str, &str)]) {
        self.emit(MetricEvent {
            name: name.to_string(),
            value: ms,
            unit: MetricUnit::Milliseconds,
            tags: owned_tags(tags),
        });
    }

    fn emit_count(&self, name: &str, n: u64, tags: &[(&str, &str)]) {
        self.emit(MetricEvent {
            name: name.to_string(),
            value: n as f64,
            unit: MetricUnit::Count,
            tags: owned_tags(tags),
        });
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MetricEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn named(&self, name: &str) -> Vec<MetricEvent> {
        self.events().into_iter().filter(|e| e.name == name).collect()
    }

    fn push(&self, event: MetricEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

impl MetricsSink for InMemoryMetrics {
    fn emit_duration(&self, name: &str, ms: f64, tags: &[(&str, &str)]) {
        self.push(MetricEvent {
            name: name.to_string(),
            value: ms,
            unit: MetricUnit::Milliseconds,
            tags: owned_tags(tags),
        });
    }

    fn emit_count(&self, name: &str, n: u64, tags: &[(&str, &str)]) {
        self.push(MetricEvent {
            name: name.to_string(),
            value: n as f64,
            unit: MetricUnit::Count,
            tags: owned_tags(tags),
        });
    }
}
