use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::finding::Finding;

/// Result of a single validator execution.
///
/// `success == false` always carries an `error` and no findings. A
/// successful output may legitimately have zero findings (clean resource).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(findings: Vec<Finding>) -> Self {
        Self {
            success: true,
            findings,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            findings: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Capability advertisement for the tool-calling collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSpec {
    /// `{"toolSpec": {"name", "description", "inputSchema": {"json": ...}}}`
    pub fn to_tool_config(&self) -> Value {
        serde_json::json!({
            "toolSpec": {
                "name": self.name,
                "description": self.description,
                "inputSchema": { "json": self.input_schema }
            }
        })
    }
}
