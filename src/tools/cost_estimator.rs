//! Monthly cost estimation and old/new comparison for compute instances

use super::base::{parse_input, Validator};
use crate::cloud::{estimate_hourly_by_family, fallback_hourly_price, PriceLookup};
use crate::error::ToolError;
use crate::models::{Finding, Severity};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

pub const COST_ESTIMATOR: &str = "CostEstimator";

/// Increases above this percentage are flagged HIGH
pub const COST_THRESHOLD_PERCENT: f64 = 20.0;

pub const DEFAULT_HOURS_PER_MONTH: f64 = 730.0;

fn default_hours() -> f64 {
    DEFAULT_HOURS_PER_MONTH
}

#[derive(Debug, Clone, Deserialize)]
pub struct CostInput {
    pub instance_type: String,
    pub region: String,
    #[serde(default = "default_hours")]
    pub hours_per_month: f64,
    #[serde(default)]
    pub old_instance_type: Option<String>,
    #[serde(default)]
    pub resource_address: Option<String>,
}

/// Percent change from `old` to `new`
///
/// A zero old cost counts as a 100% increase when the new cost is positive.
pub fn percent_change(old: f64, new: f64) -> f64 {
    if old > 0.0 {
        (new - old) / old * 100.0
    } else if new > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Single finding describing a monthly cost comparison
pub fn compare_costs(old_type: &str, old_cost: f64, new_type: &str, new_cost: f64, address: &str) -> Finding {
    let diff = new_cost - old_cost;
    let pct = percent_change(old_cost, new_cost);
    let totals = format!("Old cost: ${:.2}/month, New cost: ${:.2}/month.", old_cost, new_cost);

    if pct > COST_THRESHOLD_PERCENT {
        Finding::new(
            Severity::High,
            format!("High-impact cost increase: {} → {}", old_type, new_type),
            format!(
                "Changing from '{}' to '{}' will increase monthly cost by ${:.2} ({:.1}% increase). {} \
                 This exceeds the {}% cost increase threshold.",
                old_type,
                new_type,
                diff.abs(),
                pct,
                totals,
                COST_THRESHOLD_PERCENT
            ),
            address,
            format!(
                "Review the need for upgrading to '{}'. Confirm the extra capacity is required, check \
                 whether a smaller type performs well enough, and consider Reserved Instances or \
                 Savings Plans.",
                new_type
            ),
        )
    } else if pct > 0.0 {
        Finding::new(
            Severity::Low,
            format!("Cost increase: {} → {}", old_type, new_type),
            format!(
                "Changing from '{}' to '{}' will increase monthly cost by ${:.2} ({:.1}% increase). {}",
                old_type,
                new_type,
                diff.abs(),
                pct,
                totals
            ),
            address,
            format!(
                "The cost increase is within acceptable limits (<{}%). Ensure the change matches workload \
                 requirements.",
                COST_THRESHOLD_PERCENT
            ),
        )
    } else if pct < 0.0 {
        Finding::new(
            Severity::Low,
            format!("Cost savings: {} → {}", old_type, new_type),
            format!(
                "Changing from '{}' to '{}' will decrease monthly cost by ${:.2} ({:.1}% decrease). {}",
                old_type,
                new_type,
                diff.abs(),
                pct.abs(),
                totals
            ),
            address,
            "This change results in savings. Ensure the smaller instance type handles the workload without \
             performance degradation.",
        )
    } else {
        Finding::new(
            Severity::Low,
            format!("No cost change: {} → {}", old_type, new_type),
            format!(
                "Changing from '{}' to '{}' has no cost impact. Both cost approximately ${:.2}/month.",
                old_type, new_type, new_cost
            ),
            address,
            "No cost-related action required.",
        )
    }
}

pub struct CostEstimator {
    prices: Arc<dyn PriceLookup>,
}

impl CostEstimator {
    pub fn new(prices: Arc<dyn PriceLookup>) -> Self {
        Self { prices }
    }

    /// Hourly rate: live lookup, then the fallback table, then the family heuristic
    pub async fn hourly_rate(&self, instance_type: &str, region: &str) -> f64 {
        match self.prices.hourly_price(instance_type, region).await {
            Ok(Some(rate)) if rate.is_finite() && rate >= 0.0 => return rate,
            Ok(_) => debug!(instance_type = %instance_type, region = %region, "No live price"),
            Err(e) => warn!(instance_type = %instance_type, error = %e, "Price lookup failed, using fallback"),
        }
        fallback_hourly_price(instance_type).unwrap_or_else(|| estimate_hourly_by_family(instance_type))
    }

    pub async fn monthly_cost(&self, instance_type: &str, region: &str, hours_per_month: f64) -> f64 {
        self.hourly_rate(instance_type, region).await * hours_per_month
    }
}

#[async_trait]
impl Validator for CostEstimator {
    fn name(&self) -> &str {
        COST_ESTIMATOR
    }

    fn description(&self) -> &str {
        "Estimates monthly EC2 instance cost and compares old and new instance types, flagging cost \
         increases above 20% as high impact."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "instance_type": {"type": "string", "description": "Instance type to price (e.g., m5.large)"},
                "region": {"type": "string", "description": "Region for pricing (e.g., us-east-1)"},
                "hours_per_month": {"type": "number", "description": "Hours per month", "default": 730},
                "old_instance_type": {"type": "string", "description": "Previous instance type (optional)"},
                "resource_address": {"type": "string", "description": "Plan address of the instance"}
            },
            "required": ["instance_type", "region"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<Vec<Finding>, ToolError> {
        let input: CostInput = parse_input(input)?;
        if !(input.hours_per_month > 0.0) {
            return Err(ToolError::InvalidInput(format!(
                "hours_per_month must be positive, got {}",
                input.hours_per_month
            )));
        }
        let address = input
            .resource_address
            .clone()
            .unwrap_or_else(|| "aws_instance".to_string());

        let new_cost = self
            .monthly_cost(&input.instance_type, &input.region, input.hours_per_month)
            .await;

        let finding = match input.old_instance_type.as_deref().filter(|t| !t.is_empty()) {
            Some(old_type) => {
                let old_cost = self.monthly_cost(old_type, &input.region, input.hours_per_month).await;
                compare_costs(old_type, old_cost, &input.instance_type, new_cost, &address)
            }
            None => Finding::new(
                Severity::Low,
                format!("Estimated monthly cost for {}", input.instance_type),
                format!(
                    "The instance type '{}' in region '{}' will cost approximately ${:.2} per month \
                     (based on {} hours).",
                    input.instance_type, input.region, new_cost, input.hours_per_month
                ),
                address,
                "Review the instance type selection against workload requirements. Consider smaller types \
                 for development and testing environments.",
            ),
        };

        Ok(vec![finding])
    }
}
