//! Markdown report rendering with a hard length bound

use crate::models::{CostAnalysis, Finding};

pub const MAX_SECTION_LENGTH: usize = 9000;

/// Room kept for the omission footer when rebuilding a truncated report
pub const FOOTER_MARGIN: usize = 200;

const SECURITY_KEYWORDS: &[&str] = &["security", "compliance"];
const COST_KEYWORDS: &[&str] = &["cost"];
const OPERATIONAL_KEYWORDS: &[&str] = &["operations", "operational", "performance"];

const MAX_RECOMMENDATIONS: usize = 5;

/// Renders findings and an optional cost table into one bounded report
///
/// Sections are selected by keyword match on title + description. A finding
/// can land in several sections, or in none; the recommendations section
/// always considers the full list.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    max_length: usize,
    incomplete: bool,
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::with_max_length(MAX_SECTION_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            incomplete: false,
        }
    }

    /// Some checks did not run to completion, so an empty report is not "all clear"
    pub fn incomplete(mut self, incomplete: bool) -> Self {
        self.incomplete = incomplete;
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Format findings (and cost data, if any) as markdown
    ///
    /// # Arguments
    /// * `findings` - aggregated findings in validator order
    /// * `cost` - comparison table; an empty table counts as absent
    ///
    /// # Returns
    /// A report of at most `max_length` characters
    pub fn format(&self, findings: &[Finding], cost: Option<&CostAnalysis>) -> String {
        let cost = cost.filter(|c| !c.is_empty());
        let mut parts = vec!["## 🔍 Analysis Summary\n".to_string()];

        let security = filter_by_keywords(findings, SECURITY_KEYWORDS);
        let cost_findings = filter_by_keywords(findings, COST_KEYWORDS);
        let operational = filter_by_keywords(findings, OPERATIONAL_KEYWORDS);

        if !security.is_empty() {
            parts.push(security_section(&security));
        }
        if cost.is_some() || !cost_findings.is_empty() {
            parts.push(cost_section(&cost_findings, cost));
        }
        if !operational.is_empty() {
            parts.push(operational_section(&operational));
        }
        if !findings.is_empty() {
            parts.push(recommendations_section(findings));
        }
        if findings.is_empty() && cost.is_none() && !self.incomplete {
            parts.push("\n### 🟢 All Clear\n\n".to_string());
            parts.push("No security, cost, or operational issues detected in this Terraform plan.\n".to_string());
        }

        let full = parts.join("\n");
        if char_len(&full) <= self.max_length {
            full
        } else {
            self.truncated(findings)
        }
    }

    /// Rebuild from CRITICAL/HIGH findings only, adding whole findings while
    /// the running length stays within `max_length - FOOTER_MARGIN`
    fn truncated(&self, findings: &[Finding]) -> String {
        let budget = self.max_length.saturating_sub(FOOTER_MARGIN);

        let mut priority: Vec<&Finding> = findings.iter().filter(|f| f.severity.is_priority()).collect();
        priority.sort_by_key(|f| f.severity);

        let mut out = String::from("## 🔍 Analysis Summary\n");
        out.push_str("\n⚠️ *Output truncated to show critical and high-priority findings only*\n");
        let mut length = char_len(&out);
        let mut included = 0;

        for finding in priority {
            let text = render_finding(finding);
            let header = if included == 0 { "\n### 🚨 Priority Findings\n" } else { "" };
            let added = char_len(&text) + char_len(header);
            if length + added > budget {
                break;
            }
            out.push_str(header);
            out.push_str(&text);
            length += added;
            included += 1;
        }

        let omitted = findings.len() - included;
        if omitted > 0 {
            out.push_str(&format!(
                "\n\n*{} additional findings omitted due to length constraints*\n",
                omitted
            ));
        }
        out
    }
}

/// Cut free text to `max_length` characters at a line boundary, with a footer
///
/// Used for narrative text that has no finding structure to rebuild from.
pub fn bound_text(text: &str, max_length: usize) -> String {
    if char_len(text) <= max_length {
        return text.to_string();
    }

    let footer = "\n\n*Output truncated due to length constraints*\n";
    let budget = max_length.saturating_sub(char_len(footer));
    let mut out = String::new();
    let mut length = 0;

    for line in text.split_inclusive('\n') {
        let n = char_len(line);
        if length + n > budget {
            break;
        }
        out.push_str(line);
        length += n;
    }

    // a single over-long first line: fall back to a character cut
    if out.is_empty() {
        out = text.chars().take(budget).collect();
    }
    out.push_str(footer);
    out
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn filter_by_keywords<'a>(findings: &'a [Finding], keywords: &[&str]) -> Vec<&'a Finding> {
    findings
        .iter()
        .filter(|f| {
            let text = f.search_text();
            keywords.iter().any(|k| text.contains(k))
        })
        .collect()
}

fn render_finding(f: &Finding) -> String {
    format!(
        "\n{} **{}**: {}\n- **Resource**: `{}`\n- **Issue**: {}\n- **Remediation**: {}\n",
        f.severity.emoji(),
        f.severity.label(),
        f.title,
        f.resource_address,
        f.description,
        f.remediation
    )
}

fn security_section(findings: &[&Finding]) -> String {
    let mut sorted = findings.to_vec();
    sorted.sort_by_key(|f| f.severity);

    let mut section = String::from("\n### 🚨 Security Findings\n");
    for f in sorted {
        section.push_str(&render_finding(f));
    }
    section
}

fn cost_section(findings: &[&Finding], cost: Option<&CostAnalysis>) -> String {
    let mut section = String::from("\n### 💰 Cost Analysis\n");
    if let Some(cost) = cost {
        section.push_str(&cost_table(cost));
    }
    if !findings.is_empty() {
        section.push_str("\n**Cost Findings:**\n");
        for f in findings {
            section.push_str(&format!(
                "\n{} {}\n- **Resource**: `{}`\n- **Impact**: {}\n- **Recommendation**: {}\n",
                f.severity.emoji(),
                f.title,
                f.resource_address,
                f.description,
                f.remediation
            ));
        }
    }
    section
}

fn monthly(amount: f64) -> String {
    if amount > 0.0 {
        format!("${:.2}/mo", amount)
    } else {
        "$0.00".to_string()
    }
}

fn delta(change: f64, glyphs: bool) -> String {
    let (up, down) = if glyphs { (" 🔴", " 🟢") } else { ("", "") };
    if change > 0.0 {
        format!("+${:.2}{}", change, up)
    } else if change < 0.0 {
        format!("-${:.2}{}", change.abs(), down)
    } else {
        "$0.00".to_string()
    }
}

pub fn cost_table(cost: &CostAnalysis) -> String {
    let mut table = String::from("\n| Resource | Current Cost | New Cost | Change |\n");
    table.push_str("|----------|-------------|----------|--------|\n");

    for r in &cost.resources {
        table.push_str(&format!(
            "| {} | {} | ${:.2}/mo | {} |\n",
            r.resource_name,
            monthly(r.current_cost),
            r.new_cost,
            delta(r.delta(), true)
        ));
    }

    table.push_str(&format!(
        "| **Total** | **{}** | **${:.2}/mo** | **{}** |\n",
        monthly(cost.total_current_cost()),
        cost.total_new_cost(),
        delta(cost.total_delta(), false)
    ));
    table
}

fn operational_section(findings: &[&Finding]) -> String {
    let mut section = String::from("\n### ⚙️ Operational Findings\n");
    for f in findings {
        section.push_str(&format!(
            "\n{} {}\n- **Resource**: `{}`\n- **Issue**: {}\n- **Recommendation**: {}\n",
            f.severity.emoji(),
            f.title,
            f.resource_address,
            f.description,
            f.remediation
        ));
    }
    section
}

fn recommendations_section(findings: &[Finding]) -> String {
    let mut priority: Vec<&Finding> = findings.iter().filter(|f| f.severity.is_priority()).collect();
    priority.sort_by_key(|f| f.severity);

    let mut section = String::from("\n### 🟢 Key Recommendations\n");
    if priority.is_empty() {
        section.push_str(
            "\nNo critical or high-priority actions required. Continue monitoring for best practices.\n",
        );
        return section;
    }

    section.push_str("\n**Priority Actions:**\n");
    for (i, f) in priority.iter().take(MAX_RECOMMENDATIONS).enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, f.remediation));
    }
    section
}
