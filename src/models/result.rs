use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Passed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "passed",
            RunStatus::Failed => "failed",
        }
    }
}

/// One bounded-length report body returned to the outer handler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSegment {
    /// Stable identifier, e.g. `impact-analysis`
    pub outcome_id: String,
    /// Short label shown next to the body
    pub description: String,
    pub body: String,
}

impl ReportSegment {
    pub fn new(
        outcome_id: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            outcome_id: outcome_id.into(),
            description: description.into(),
            body: body.into(),
        }
    }

}

/// Verdict returned by `run_plan_analysis`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunTaskResult {
    pub status: RunStatus,
    pub message: String,
    pub results: Vec<ReportSegment>,
    /// Set when the deadline fired before every validator ran
    #[serde(default)]
    pub partial: bool,
}

impl RunTaskResult {
    pub fn segment(&self, outcome_id: &str) -> Option<&ReportSegment> {
        self.results.iter().find(|s| s.outcome_id == outcome_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RunStatus::Passed).unwrap(), "\"passed\"");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_segment_lookup() {
        let result = RunTaskResult {
            status: RunStatus::Passed,
            message: "ok".into(),
            results: vec![ReportSegment::new("a", "A", "x")],
            partial: false,
        };
        assert!(result.segment("a").is_some());
        assert!(result.segment("b").is_none());
    }
}
