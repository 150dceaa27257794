//! Storage bucket checks: public access block and server-side encryption
//!
//! Works purely on plan data; no provider calls.

use super::base::{parse_input, Validator};
use crate::error::ToolError;
use crate::models::{Finding, Severity};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const STORAGE_VALIDATOR: &str = "S3Validator";

const SUPPORTED_ALGORITHMS: &[&str] = &["aes256", "aws:kms"];

const ACCESS_BLOCK_SNIPPET: &str = "resource \"aws_s3_bucket_public_access_block\" \"example\" {\n  \
     bucket = aws_s3_bucket.example.id\n  \
     block_public_acls       = true\n  \
     block_public_policy     = true\n  \
     ignore_public_acls      = true\n  \
     restrict_public_buckets = true\n}";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PublicAccessBlock {
    #[serde(default)]
    pub block_public_acls: bool,
    #[serde(default)]
    pub block_public_policy: bool,
    #[serde(default)]
    pub ignore_public_acls: bool,
    #[serde(default)]
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    /// Human labels of every flag that is off, in a fixed order
    pub fn disabled_labels(&self) -> Vec<&'static str> {
        [
            (self.block_public_acls, "Block Public ACLs"),
            (self.block_public_policy, "Block Public Policy"),
            (self.ignore_public_acls, "Ignore Public ACLs"),
            (self.restrict_public_buckets, "Restrict Public Buckets"),
        ]
        .into_iter()
        .filter(|(on, _)| !on)
        .map(|(_, label)| label)
        .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct EncryptionSpec {
    #[serde(default)]
    pub sse_algorithm: Option<String>,
    #[serde(default)]
    pub kms_master_key_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageInput {
    pub bucket_name: String,
    #[serde(default)]
    pub public_access_block: Option<PublicAccessBlock>,
    #[serde(default)]
    pub encryption: Option<EncryptionSpec>,
    #[serde(default)]
    pub resource_address: Option<String>,
}

pub struct StorageValidator;

impl StorageValidator {
    pub fn new() -> Self {
        Self
    }

    /// Findings for one bucket: public-access finding first, then encryption
    pub fn check(input: &StorageInput) -> Vec<Finding> {
        let address = input
            .resource_address
            .clone()
            .unwrap_or_else(|| format!("aws_s3_bucket.{}", input.bucket_name));

        let mut findings = Vec::new();
        findings.extend(Self::check_public_access(&input.bucket_name, &address, input.public_access_block.as_ref()));
        findings.extend(Self::check_encryption(&input.bucket_name, &address, input.encryption.as_ref()));
        findings
    }

    fn check_public_access(bucket: &str, address: &str, block: Option<&PublicAccessBlock>) -> Option<Finding> {
        let Some(block) = block else {
            return Some(Finding::new(
                Severity::Critical,
                format!("S3 bucket '{}' has no public access block configured", bucket),
                format!(
                    "The S3 bucket '{}' has no public access block configured. The bucket could be made \
                     public through ACLs or bucket policies, a security risk that may expose sensitive \
                     data to the internet.",
                    bucket
                ),
                address,
                format!(
                    "Add an aws_s3_bucket_public_access_block resource with all settings set to true:\n{}",
                    ACCESS_BLOCK_SNIPPET
                ),
            ));
        };

        let disabled = block.disabled_labels();
        if disabled.is_empty() {
            return None;
        }

        Some(Finding::new(
            Severity::Critical,
            format!("S3 bucket '{}' has public access block settings disabled", bucket),
            format!(
                "The S3 bucket '{}' has the following public access block settings disabled: {}. \
                 This security gap could allow the bucket to be made public.",
                bucket,
                disabled.join(", ")
            ),
            address,
            format!(
                "Enable all public access block settings for bucket '{}':\n{}",
                bucket, ACCESS_BLOCK_SNIPPET
            ),
        ))
    }

    fn check_encryption(bucket: &str, address: &str, encryption: Option<&EncryptionSpec>) -> Option<Finding> {
        let Some(encryption) = encryption else {
            return Some(Finding::new(
                Severity::High,
                format!("S3 bucket '{}' does not have encryption enabled", bucket),
                format!(
                    "The S3 bucket '{}' does not have server-side encryption configured. Data will not \
                     be encrypted at rest, which violates security best practices and may break \
                     compliance requirements.",
                    bucket
                ),
                address,
                "Enable server-side encryption for the bucket using AES256 or KMS:\n\
                 resource \"aws_s3_bucket_server_side_encryption_configuration\" \"example\" {\n  \
                 bucket = aws_s3_bucket.example.id\n  \
                 rule {\n    apply_server_side_encryption_by_default {\n      \
                 sse_algorithm = \"AES256\"\n    }\n  }\n}",
            ));
        };

        let algorithm = encryption
            .sse_algorithm
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_lowercase();

        if algorithm.is_empty() {
            return Some(Finding::new(
                Severity::High,
                format!("S3 bucket '{}' has invalid encryption configuration", bucket),
                format!(
                    "The S3 bucket '{}' has an encryption configuration but no sse_algorithm. \
                     Encryption will not be applied, a security gap for data at rest.",
                    bucket
                ),
                address,
                "Specify a valid sse_algorithm (AES256 or aws:kms) in the encryption configuration.",
            ));
        }

        if !SUPPORTED_ALGORITHMS.contains(&algorithm.as_str()) {
            return Some(Finding::new(
                Severity::High,
                format!("S3 bucket '{}' has unsupported encryption algorithm", bucket),
                format!(
                    "The S3 bucket '{}' specifies an unsupported encryption algorithm: '{}'. \
                     Only AES256 and aws:kms meet the security baseline.",
                    bucket, algorithm
                ),
                address,
                "Use either 'AES256' for S3-managed encryption or 'aws:kms' for KMS-managed encryption.",
            ));
        }

        let has_key = encryption
            .kms_master_key_id
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        if algorithm == "aws:kms" && !has_key {
            return Some(Finding::new(
                Severity::Low,
                format!("S3 bucket '{}' uses default KMS key", bucket),
                format!(
                    "The S3 bucket '{}' uses KMS encryption without a specific key id, so the \
                     AWS-managed key (aws/s3) will be used. This limits security control over \
                     key policy and rotation.",
                    bucket
                ),
                address,
                "Consider a customer-managed KMS key for control over key management and rotation.",
            ));
        }

        None
    }
}

impl Default for StorageValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Validator for StorageValidator {
    fn name(&self) -> &str {
        STORAGE_VALIDATOR
    }

    fn description(&self) -> &str {
        "Validates S3 bucket security configuration: public access block settings and \
         server-side encryption. Use when a plan creates or changes S3 buckets."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "bucket_name": {"type": "string", "description": "S3 bucket name being validated"},
                "public_access_block": {
                    "type": "object",
                    "description": "Public access block configuration",
                    "properties": {
                        "block_public_acls": {"type": "boolean"},
                        "block_public_policy": {"type": "boolean"},
                        "ignore_public_acls": {"type": "boolean"},
                        "restrict_public_buckets": {"type": "boolean"}
                    }
                },
                "encryption": {
                    "type": "object",
                    "description": "Encryption configuration",
                    "properties": {
                        "sse_algorithm": {"type": "string", "description": "AES256 or aws:kms"},
                        "kms_master_key_id": {"type": "string", "description": "KMS key id for aws:kms"}
                    }
                },
                "resource_address": {"type": "string", "description": "Plan address of the bucket"}
            },
            "required": ["bucket_name"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<Vec<Finding>, ToolError> {
        let input: StorageInput = parse_input(input)?;
        Ok(Self::check(&input))
    }
}
