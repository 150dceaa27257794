//! Registry of available validators

use super::base::{check_contract, Validator};
use crate::error::RegistryError;
use crate::models::ToolSpec;
use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

struct Entry {
    spec: ToolSpec,
    validator: Arc<dyn Validator>,
}

/// Catalog of validators keyed by unique name, in registration order
///
/// Constructed explicitly and passed to whoever needs it. Registration and
/// lookup share one `RwLock`: readers run concurrently and never observe a
/// half-applied registration.
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator
    ///
    /// # Errors
    /// * `InvalidValidator` - empty name/description or malformed schema
    /// * `DuplicateName` - a validator with the same name is already present;
    ///   the existing entry is left untouched
    pub fn register(&self, validator: Arc<dyn Validator>) -> Result<(), RegistryError> {
        let spec = check_contract(validator.as_ref())?;

        let mut entries = self.write();
        if entries.iter().any(|e| e.spec.name == spec.name) {
            return Err(RegistryError::DuplicateName(spec.name));
        }
        info!(tool = %spec.name, "Registered validator");
        entries.push(Entry { spec, validator });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Validator>> {
        self.read()
            .iter()
            .find(|e| e.spec.name == name)
            .map(|e| Arc::clone(&e.validator))
    }

    /// Names in registration order
    pub fn list(&self) -> Vec<String> {
        self.read().iter().map(|e| e.spec.name.clone()).collect()
    }

    pub fn describe_all(&self) -> Vec<ToolSpec> {
        self.read().iter().map(|e| e.spec.clone()).collect()
    }

    /// Tool-calling declarations for the language backend
    pub fn to_tool_specs(&self) -> Vec<Value> {
        self.read().iter().map(|e| e.spec.to_tool_config()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Entries are pushed whole, so a poisoned lock still guards a consistent Vec
    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
