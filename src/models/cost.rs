use serde::{Deserialize, Serialize};

/// Old/new monthly cost of one resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostComparison {
    pub resource_name: String,
    pub current_cost: f64,
    pub new_cost: f64,
}

impl CostComparison {
    pub fn new(resource_name: impl Into<String>, current_cost: f64, new_cost: f64) -> Self {
        Self {
            resource_name: resource_name.into(),
            current_cost,
            new_cost,
        }
    }

    pub fn delta(&self) -> f64 {
        self.new_cost - self.current_cost
    }
}

/// Cost table consumed by the formatter. Derived per run, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostAnalysis {
    pub resources: Vec<CostComparison>,
}

impl CostAnalysis {
    pub fn new(resources: Vec<CostComparison>) -> Self {
        Self { resources }
    }

    pub fn push(&mut self, comparison: CostComparison) {
        self.resources.push(comparison);
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn total_current_cost(&self) -> f64 {
        self.resources.iter().map(|r| r.current_cost).sum()
    }

    pub fn total_new_cost(&self) -> f64 {
        self.resources.iter().map(|r| r.new_cost).sum()
    }

    pub fn total_delta(&self) -> f64 {
        self.total_new_cost() - self.total_current_cost()
    }
}
