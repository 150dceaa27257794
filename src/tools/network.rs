//! Security group ingress checks
//!
//! Flags rules open to `0.0.0.0/0` that allow everything or cover a
//! sensitive administrative/database port. Egress rules are accepted but
//! never produce findings.

use super::base::{parse_input, Validator};
use crate::error::ToolError;
use crate::models::{Finding, Severity};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub const NETWORK_VALIDATOR: &str = "SecurityGroupValidator";

pub const OPEN_WORLD_CIDR: &str = "0.0.0.0/0";

/// Port, service, severity; checked in this order
pub const SENSITIVE_PORTS: &[(i64, &str, Severity)] = &[
    (22, "SSH", Severity::Critical),
    (3389, "RDP", Severity::Critical),
    (3306, "MySQL", Severity::High),
    (5432, "PostgreSQL", Severity::High),
];

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct IngressRule {
    #[serde(default)]
    pub from_port: Option<i64>,
    #[serde(default)]
    pub to_port: Option<i64>,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

impl IngressRule {
    pub fn is_open_to_world(&self) -> bool {
        self.cidr_blocks.iter().any(|c| c.trim() == OPEN_WORLD_CIDR)
    }

    fn allows_all_protocols(&self) -> bool {
        let p = self.protocol.trim();
        p == "-1" || p.eq_ignore_ascii_case("all")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInput {
    pub security_group_name: String,
    #[serde(default)]
    pub ingress_rules: Vec<IngressRule>,
    #[serde(default)]
    pub egress_rules: Vec<IngressRule>,
    #[serde(default)]
    pub resource_address: Option<String>,
}

pub struct NetworkValidator;

impl NetworkValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn check(input: &NetworkInput) -> Vec<Finding> {
        let group = &input.security_group_name;
        let address = input
            .resource_address
            .clone()
            .unwrap_or_else(|| format!("aws_security_group.{}", group));

        input
            .ingress_rules
            .iter()
            .filter(|rule| rule.is_open_to_world())
            .flat_map(|rule| Self::check_rule(group, &address, rule))
            .collect()
    }

    fn check_rule(group: &str, address: &str, rule: &IngressRule) -> Vec<Finding> {
        let (from, to) = match (rule.from_port, rule.to_port) {
            (Some(from), Some(to)) if !rule.allows_all_protocols() => (from, to),
            _ => {
                return vec![Finding::new(
                    Severity::Critical,
                    format!("Security group '{}' allows all traffic from anywhere", group),
                    format!(
                        "The security group '{}' has a rule that allows all traffic (every protocol \
                         and port) from {}. Every service behind it is exposed to the internet.",
                        group, OPEN_WORLD_CIDR
                    ),
                    address,
                    "Remove the overly permissive rule and create specific rules for only the required \
                     ports and protocols. Restrict source CIDR blocks to known IP ranges or security groups.",
                )]
            }
        };

        SENSITIVE_PORTS
            .iter()
            .filter(|(port, _, _)| from <= *port && *port <= to)
            .map(|(port, service, severity)| {
                Finding::new(
                    *severity,
                    format!(
                        "Security group '{}' exposes {} (port {}) to the internet",
                        group, service, port
                    ),
                    format!(
                        "The security group '{}' allows {} access on port {} from {} (anywhere on the \
                         internet), inviting brute force attempts and unauthorized access.",
                        group, service, port, OPEN_WORLD_CIDR
                    ),
                    address,
                    port_remediation(*port, service),
                )
            })
            .collect()
    }
}

impl Default for NetworkValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn port_remediation(port: i64, service: &str) -> String {
    match port {
        22 | 3389 => format!(
            "Restrict {} access to specific IP ranges or use AWS Systems Manager Session Manager \
             instead of exposing the port. If direct access is required, limit the source CIDR to \
             your organization's IP ranges or VPN endpoints.",
            service
        ),
        3306 | 5432 => format!(
            "{} databases should never be exposed to the internet. Restrict access to application \
             security groups or VPC CIDR blocks and use VPC peering or PrivateLink for cross-VPC access.",
            service
        ),
        _ => format!(
            "Restrict {} access to specific IP ranges or security groups. Remove {} from the source CIDR blocks.",
            service, OPEN_WORLD_CIDR
        ),
    }
}

fn rule_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "from_port": {"type": "integer", "description": "Starting port number"},
            "to_port": {"type": "integer", "description": "Ending port number"},
            "protocol": {"type": "string", "description": "tcp, udp, icmp, or -1 for all"},
            "cidr_blocks": {"type": "array", "items": {"type": "string"}}
        }
    })
}

#[async_trait]
impl Validator for NetworkValidator {
    fn name(&self) -> &str {
        NETWORK_VALIDATOR
    }

    fn description(&self) -> &str {
        "Validates security group rules for overly permissive ingress. Checks 0.0.0.0/0 access to \
         SSH (22), RDP (3389), MySQL (3306) and PostgreSQL (5432), and all-traffic rules."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "security_group_name": {"type": "string", "description": "Security group name or id"},
                "ingress_rules": {"type": "array", "items": rule_schema()},
                "egress_rules": {"type": "array", "items": rule_schema()},
                "resource_address": {"type": "string", "description": "Plan address of the group"}
            },
            "required": ["security_group_name"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<Vec<Finding>, ToolError> {
        let input: NetworkInput = parse_input(input)?;
        Ok(Self::check(&input))
    }
}
