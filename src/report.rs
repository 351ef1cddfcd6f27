//! Document-level report assembly.

use crate::schema::{ConfidenceReport, FieldConfidence, FieldStatus, ReportSummary};

/// Roll the per-field records up into the document report.
///
/// The overall score is an unweighted mean over every entry, flight
/// segments included, so flight-heavy documents lean toward their
/// flight-level scores. That matches the observed upstream behavior and is
/// kept as-is.
pub fn build_report(field_confidences: Vec<FieldConfidence>) -> ConfidenceReport {
    let overall_score = if field_confidences.is_empty() {
        0.0
    } else {
        field_confidences
            .iter()
            .map(|f| f.confidence_score)
            .sum::<f64>()
            / field_confidences.len() as f64
    };

    let mut summary = ReportSummary::default();
    for record in &field_confidences {
        match record.status {
            FieldStatus::Use => summary.use_count += 1,
            FieldStatus::Review => summary.review_count += 1,
            FieldStatus::Reject => summary.reject_count += 1,
        }
    }

    ConfidenceReport {
        overall_score,
        field_confidences,
        summary,
    }
}

impl ConfidenceReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render the report as a markdown audit table.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();

        out.push_str("# Confidence Report\n\n");
        out.push_str(&format!(
            "Overall score: {:.2} | use: {} | review: {} | reject: {}\n\n",
            self.overall_score,
            self.summary.use_count,
            self.summary.review_count,
            self.summary.reject_count
        ));

        out.push_str("| Field | Score | Status | Weakest Signal |\n");
        out.push_str("|-------|-------|--------|----------------|\n");

        for record in &self.field_confidences {
            let status = match record.status {
                FieldStatus::Use => "use",
                FieldStatus::Review => "review",
                FieldStatus::Reject => "reject",
            };

            let weakest = record
                .components
                .iter()
                .min_by(|a, b| a.score.total_cmp(&b.score))
                .map(|c| format!("{} ({:.2})", c.name, c.score))
                .unwrap_or_else(|| "-".to_string());

            out.push_str(&format!(
                "| {} | {:.2} | {} | {} |\n",
                record.field, record.confidence_score, status, weakest
            ));
        }

        out
    }
}
