//! Instance type availability and AMI checks

use super::base::{parse_input, Validator};
use crate::cloud::static_catalog::split_instance_type;
use crate::cloud::{AmiLookup, Availability, AvailabilityLookup};
use crate::coordinator::{retry_with_backoff, Attempted, RetryPolicy};
use crate::error::{ProviderError, ToolError};
use crate::models::{Finding, Severity};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub const COMPUTE_VALIDATOR: &str = "EC2Validator";

/// Previous-generation family to its current replacement
const FAMILY_UPGRADES: &[(&str, &str)] = &[
    ("t2", "t3"),
    ("t3", "t3a"),
    ("m4", "m5"),
    ("m5", "m6i"),
    ("c4", "c5"),
    ("c5", "c6i"),
    ("r4", "r5"),
    ("r5", "r6i"),
];

const DEFAULT_UPGRADE_FAMILY: &str = "t3";

#[derive(Debug, Clone, Deserialize)]
pub struct ComputeInput {
    pub instance_type: String,
    pub region: String,
    #[serde(default)]
    pub ami_id: Option<String>,
    #[serde(default)]
    pub resource_address: Option<String>,
}

/// Suggested replacement keeping the size suffix, e.g. `t2.micro` -> `t3.micro`
pub fn suggest_instance_type(instance_type: &str) -> Option<String> {
    let (family, size) = split_instance_type(instance_type)?;
    let upgraded = FAMILY_UPGRADES
        .iter()
        .find(|(old, _)| *old == family)
        .map(|(_, new)| *new)
        .unwrap_or(DEFAULT_UPGRADE_FAMILY);
    Some(format!("{}.{}", upgraded, size))
}

fn upgrade_remediation(instance_type: &str, region: &str) -> String {
    match suggest_instance_type(instance_type) {
        Some(alternative) => format!(
            "Consider using '{}' instead, a current generation instance type available in most regions. \
             Otherwise check instance type availability in {}.",
            alternative, region
        ),
        None => format!(
            "Use a valid instance type format (e.g., t3.micro) in region {}.",
            region
        ),
    }
}

pub struct ComputeValidator {
    availability: Arc<dyn AvailabilityLookup>,
    amis: Arc<dyn AmiLookup>,
    lookup_policy: RetryPolicy,
}

impl ComputeValidator {
    pub fn new(availability: Arc<dyn AvailabilityLookup>, amis: Arc<dyn AmiLookup>) -> Self {
        Self {
            availability,
            amis,
            lookup_policy: RetryPolicy::default(),
        }
    }

    /// Backoff used for transient availability lookup failures
    pub fn with_lookup_policy(mut self, policy: RetryPolicy) -> Self {
        self.lookup_policy = policy;
        self
    }

    /// Availability finding for (type, region)
    ///
    /// Transient errors are retried here; a lookup that still fails becomes a
    /// MEDIUM finding so the AMI check for the same instance still runs.
    async fn check_instance_type(&self, input: &ComputeInput, address: &str) -> Option<Finding> {
        let ComputeInput {
            instance_type, region, ..
        } = input;

        let Attempted { result, attempts } = retry_with_backoff(
            &self.lookup_policy,
            "availability",
            ProviderError::is_retryable,
            || self.availability.check_availability(instance_type, region),
        )
        .await;

        match result {
            Ok(Availability::Available) => {
                info!(instance_type = %instance_type, region = %region, "Instance type available");
                None
            }
            Ok(Availability::NotFound) => Some(Finding::new(
                Severity::Critical,
                format!("Invalid instance type: {}", instance_type),
                format!(
                    "The instance type '{}' does not exist. This is likely a typo or a retired type, \
                     and the apply will fail, an operational blocker for this change.",
                    instance_type
                ),
                address,
                upgrade_remediation(instance_type, region),
            )),
            Ok(Availability::NotOffered) => Some(Finding::new(
                Severity::High,
                format!("Instance type {} not available in {}", instance_type, region),
                format!(
                    "The instance type '{}' is not offered in region '{}'. Deployment will fail, an \
                     operational risk for this change.",
                    instance_type, region
                ),
                address,
                upgrade_remediation(instance_type, region),
            )),
            Err(e) => {
                warn!(instance_type = %instance_type, attempts, error = %e, "Instance type lookup failed");
                Some(Finding::new(
                    Severity::Medium,
                    format!("Unable to validate instance type {}", instance_type),
                    format!(
                        "The availability lookup failed, so the operational check could not run: {}",
                        e
                    ),
                    address,
                    "Verify credentials and permissions for the instance type lookup (DescribeInstanceTypes).",
                ))
            }
        }
    }

    async fn check_ami(&self, ami_id: &str, address: &str) -> Option<Finding> {
        match self.amis.ami_metadata(ami_id).await {
            Ok(Some(info)) => Some(Finding::new(
                Severity::Low,
                format!("ECS-optimized AMI detected: {}", info.ami_name),
                format!(
                    "Using ECS-optimized AMI '{}' ({}). OS: {}. Keep the AMI current for operational stability.",
                    info.ami_name,
                    ami_id,
                    info.os_name.as_deref().unwrap_or("N/A")
                ),
                address,
                "Ensure this AMI version is up to date. Check the ECS AMI release notes for the latest \
                 security patches.",
            )),
            Ok(None) => None,
            Err(e) => Some(ami_lookup_failed(ami_id, address, &e)),
        }
    }
}

fn ami_lookup_failed(ami_id: &str, address: &str, error: &ProviderError) -> Finding {
    warn!(ami_id = %ami_id, error = %error, "AMI lookup failed");
    Finding::new(
        Severity::Low,
        "Unable to retrieve AMI release information",
        format!(
            "Could not fetch release notes for AMI {}, so its operational status is unknown: {}",
            ami_id, error
        ),
        address,
        "Verify the AMI id is correct and accessible in your account.",
    )
}

#[async_trait]
impl Validator for ComputeValidator {
    fn name(&self) -> &str {
        COMPUTE_VALIDATOR
    }

    fn description(&self) -> &str {
        "Validates EC2 instance configuration: instance type availability in the target region and \
         AMI release information. Use when a plan creates or changes EC2 instances."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "instance_type": {"type": "string", "description": "EC2 instance type (e.g., t3.micro)"},
                "region": {"type": "string", "description": "Region to check availability in"},
                "ami_id": {"type": "string", "description": "AMI id to look up (optional)"},
                "resource_address": {"type": "string", "description": "Plan address of the instance"}
            },
            "required": ["instance_type", "region"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<Vec<Finding>, ToolError> {
        let input: ComputeInput = parse_input(input)?;
        let address = input
            .resource_address
            .clone()
            .unwrap_or_else(|| "aws_instance".to_string());

        let mut findings = Vec::new();
        findings.extend(self.check_instance_type(&input, &address).await);

        if let Some(ami_id) = input.ami_id.as_deref().filter(|id| !id.trim().is_empty()) {
            findings.extend(self.check_ami(ami_id, &address).await);
        }

        Ok(findings)
    }
}
