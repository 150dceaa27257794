// planguard data models

pub mod finding;
pub mod tool;
pub mod cost;
pub mod plan;
pub mod result;

// Re-exports for convenience
pub use finding::{Finding, Severity};
pub use tool::{ToolOutput, ToolSpec};
pub use cost::{CostAnalysis, CostComparison};
pub use plan::{Change, ChangeKind, ChangeSummary, PlanDocument, ResourceChange};
pub use result::{ReportSegment, RunStatus, RunTaskResult};
