// planguard - policy analysis for infrastructure plans
// Module re-exports

pub mod analysis;
pub mod cloud;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod formatter;
pub mod llm;
pub mod models;
pub mod observability;
pub mod tools;

// Re-export commonly used types
pub use models::{
    Finding, Severity, ToolOutput, ToolSpec,
    PlanDocument, ReportSegment, RunStatus, RunTaskResult,
    CostAnalysis, CostComparison
};

pub use analysis::{default_registry, degraded_result, Collaborators, PlanAnalyzer};
pub use config::{AnalyzerConfig, Enforcement};
pub use coordinator::{ExecutionCoordinator, RetryPolicy, ToolInvocation};
pub use error::{AnalysisError, ErrorKind, ProviderError, RegistryError, ToolError};
pub use formatter::OutputFormatter;
pub use tools::{ToolRegistry, Validator};
