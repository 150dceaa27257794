use serde::{Deserialize, Serialize};

/// Urgency of a finding. Declaration order is the sort order:
/// `Critical < High < Medium < Low` (lower is more urgent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "low")]
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }

    /// Display label used in reports ("Critical", "High", ...)
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Medium => "🟡",
            Severity::Low => "🟢",
        }
    }

    /// Critical and high findings are the ones surfaced as priority actions
    /// and kept when a report has to be truncated.
    pub fn is_priority(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

/// A single flagged issue produced by a validator.
///
/// Findings are plain values: created fresh for each analysis run, never
/// mutated afterwards, compared by field equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub resource_address: String,
    pub remediation: String,
}

impl Finding {
    pub fn new(
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        resource_address: impl Into<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
            resource_address: resource_address.into(),
            remediation: remediation.into(),
        }
    }

    /// Title and remediation are both present
    pub fn is_well_formed(&self) -> bool {
        !self.title.trim().is_empty() && !self.remediation.trim().is_empty()
    }

    /// Lowercased `title + description`, used for keyword categorisation
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_as_str() {
        assert_eq!(Severity::Critical.as_str(), "critical");
        assert_eq!(Severity::High.as_str(), "high");
        assert_eq!(Severity::Medium.as_str(), "medium");
        assert_eq!(Severity::Low.as_str(), "low");
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from_str("critical"), Some(Severity::Critical));
        assert_eq!(Severity::from_str("HIGH"), Some(Severity::High));
        assert_eq!(Severity::from_str("medium"), Some(Severity::Medium));
        assert_eq!(Severity::from_str("low"), Some(Severity::Low));
        assert_eq!(Severity::from_str("5"), None);
        assert_eq!(Severity::from_str("invalid"), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical < Severity::High);
        assert!(Severity::High < Severity::Medium);
        assert!(Severity::Medium < Severity::Low);

        let mut shuffled = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        shuffled.sort();
        assert_eq!(shuffled, Severity::ALL.to_vec());
    }

    #[test]
    fn test_severity_priority() {
        assert!(Severity::Critical.is_priority());
        assert!(Severity::High.is_priority());
        assert!(!Severity::Medium.is_priority());
        assert!(!Severity::Low.is_priority());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let back: Severity = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(back, Severity::Low);
        assert!(serde_json::from_str::<Severity>("3").is_err());
    }

    #[test]
    fn test_finding_creation() {
        let finding = Finding::new(
            Severity::High,
            "Encryption disabled",
            "Bucket is not encrypted",
            "aws_s3_bucket.logs",
            "Enable SSE",
        );

        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.resource_address, "aws_s3_bucket.logs");
        assert!(finding.is_well_formed());
    }

    #[test]
    fn test_finding_without_remediation_is_not_well_formed() {
        let finding = Finding::new(Severity::Low, "t", "d", "r", "  ");
        assert!(!finding.is_well_formed());
    }

    #[test]
    fn test_search_text_is_lowercase() {
        let finding = Finding::new(Severity::Low, "Cost Increase", "Monthly COST", "r", "x");
        assert_eq!(finding.search_text(), "cost increase monthly cost");
    }
}
