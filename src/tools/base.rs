//! Validator interface
//!
//! A validator is four members: a unique name, a description for the tool
//! catalog, a JSON input schema, and `execute`. Conformance is checked
//! structurally at registration time by [`check_contract`].

use crate::error::{RegistryError, ToolError};
use crate::models::{Finding, ToolSpec};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

#[async_trait]
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the input record (`type: object` with `properties`)
    fn input_schema(&self) -> Value;

    /// Inspect one input record and return its findings
    ///
    /// Implementations build their typed input with [`parse_input`] first
    /// and never touch shared mutable state.
    async fn execute(&self, input: &Value) -> Result<Vec<Finding>, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Build a validator's typed input, rejecting missing or mistyped fields
pub fn parse_input<T: DeserializeOwned>(input: &Value) -> Result<T, ToolError> {
    if !input.is_object() {
        return Err(ToolError::InvalidInput(format!(
            "expected a JSON object, got {}",
            json_type_name(input)
        )));
    }
    serde_json::from_value(input.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

/// Validate a candidate's metadata before it is allowed into a registry
///
/// # Returns
/// The validator's `ToolSpec`, captured once so the registry can check for
/// duplicates without calling back into the validator under its lock.
pub fn check_contract(validator: &dyn Validator) -> Result<ToolSpec, RegistryError> {
    let spec = validator.spec();
    let reject = |reason: &str| RegistryError::InvalidValidator {
        name: spec.name.clone(),
        reason: reason.to_string(),
    };

    if spec.name.trim().is_empty() {
        return Err(reject("name must not be empty"));
    }
    if spec.description.trim().is_empty() {
        return Err(reject("description must not be empty"));
    }
    match spec.input_schema.get("type").and_then(Value::as_str) {
        Some("object") => {}
        _ => return Err(reject("input schema must declare type: object")),
    }
    if !spec
        .input_schema
        .get("properties")
        .map(Value::is_object)
        .unwrap_or(false)
    {
        return Err(reject("input schema must declare a properties map"));
    }

    Ok(spec)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
