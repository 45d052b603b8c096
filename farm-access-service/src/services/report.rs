//! Rendering of health check results into shareable reports.

use askama::Template;
use serde::Serialize;
use service_core::error::AppError;

use crate::models::{HealthCheckResult, HealthIssue, ReportFormat};

/// Turns a health check result into a document in the requested format.
pub trait ReportGenerator: Send + Sync {
    fn render(&self, result: &HealthCheckResult, format: ReportFormat)
        -> Result<String, AppError>;
}

/// Built-in renderer for HTML, CSV and plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardReportGenerator;

impl ReportGenerator for StandardReportGenerator {
    fn render(
        &self,
        result: &HealthCheckResult,
        format: ReportFormat,
    ) -> Result<String, AppError> {
        match format {
            ReportFormat::Html => render_html(result),
            ReportFormat::Csv => render_csv(result),
            ReportFormat::Text => Ok(render_text(result)),
        }
    }
}

const CSV_HEADER: [&str; 5] = ["severity", "rule", "collection", "record_id", "message"];

/// One issue as a flat report row.
#[derive(Debug, Serialize)]
struct IssueRow<'a> {
    severity: &'a str,
    rule: &'a str,
    collection: &'a str,
    record_id: &'a str,
    message: &'a str,
}

impl<'a> IssueRow<'a> {
    fn from_issue(issue: &'a HealthIssue) -> Self {
        Self {
            severity: issue.severity.as_str(),
            rule: &issue.rule,
            collection: issue.collection.as_str(),
            record_id: issue.record_id.as_deref().unwrap_or(""),
            message: &issue.message,
        }
    }
}

#[derive(Template)]
#[template(path = "health_report.html")]
struct HealthReportTemplate<'a> {
    checked_at: String,
    records_checked: usize,
    errors: usize,
    warnings: usize,
    rows: Vec<IssueRow<'a>>,
}

fn render_text(result: &HealthCheckResult) -> String {
    let mut out = format!(
        "Farm Records Health Check\nChecked at: {}\nRecords checked: {}\nErrors: {}\nWarnings: {}\n",
        result.checked_at.to_rfc3339(),
        result.records_checked,
        result.error_count(),
        result.warning_count()
    );

    if result.is_healthy() {
        out.push_str("\nNo issues found.\n");
        return out;
    }

    out.push('\n');
    for issue in &result.issues {
        out.push_str(&format!(
            "[{}] {} {}{}: {}\n",
            issue.severity.as_str().to_uppercase(),
            issue.rule,
            issue.collection,
            issue
                .record_id
                .as_deref()
                .map(|id| format!("/{}", id))
                .unwrap_or_default(),
            issue.message
        ));
    }
    out
}

fn render_csv(result: &HealthCheckResult) -> Result<String, AppError> {
    let csv_error =
        |e: csv::Error| AppError::InternalError(anyhow::anyhow!("CSV report error: {}", e));

    // Header written by hand so an empty report still carries it
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(CSV_HEADER).map_err(csv_error)?;
    for issue in &result.issues {
        wtr.serialize(IssueRow::from_issue(issue)).map_err(csv_error)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("CSV report error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::InternalError(anyhow::Error::new(e)))
}

fn render_html(result: &HealthCheckResult) -> Result<String, AppError> {
    HealthReportTemplate {
        checked_at: result.checked_at.to_rfc3339(),
        records_checked: result.records_checked,
        errors: result.error_count(),
        warnings: result.warning_count(),
        rows: result.issues.iter().map(IssueRow::from_issue).collect(),
    }
    .render()
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("HTML report error: {}", e)))
}
