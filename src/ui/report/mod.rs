//! Report generation for scan results.

use crate::core::error::{Error, Result};
use crate::core::types::ScanReport;
use crate::quarantine::QuarantineSummary;
use crate::ui::cli::OutputFormat;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Report format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    /// Pick a format from an output file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "json" => Some(ReportFormat::Json),
            "txt" | "log" => Some(ReportFormat::Text),
            _ => None,
        }
    }
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

/// JSON document shape: the report plus derived totals.
#[derive(Serialize)]
struct JsonDocument<'a> {
    #[serde(flatten)]
    report: &'a ScanReport,
    threats_found: usize,
    duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quarantine: Option<&'a QuarantineSummary>,
}

/// Render a report.
pub fn render(report: &ScanReport, format: ReportFormat) -> Result<String> {
    render_with_quarantine(report, None, format)
}

/// Render a report together with the outcome of quarantining its files.
pub fn render_with_quarantine(
    report: &ScanReport,
    quarantine: Option<&QuarantineSummary>,
    format: ReportFormat,
) -> Result<String> {
    match format {
        ReportFormat::Json => {
            let document = JsonDocument {
                report,
                threats_found: report.threats_found(),
                duration_ms: report.duration_ms(),
                quarantine,
            };
            Ok(serde_json::to_string_pretty(&document)?)
        }
        ReportFormat::Text => Ok(render_text(report, quarantine)),
    }
}

/// Render a report, with the quarantine outcome if any, and write it to a file.
pub fn write_report(
    report: &ScanReport,
    quarantine: Option<&QuarantineSummary>,
    format: ReportFormat,
    output_path: &Path,
) -> Result<()> {
    let rendered = render_with_quarantine(report, quarantine, format)?;
    std::fs::write(output_path, rendered).map_err(|e| Error::file_write(output_path, e))?;
    log::info!("Report written to {:?}", output_path);
    Ok(())
}

fn render_text(report: &ScanReport, quarantine: Option<&QuarantineSummary>) -> String {
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Scan of {} [{}]", report.target.display(), report.status);
    let _ = writeln!(out, "Scan ID:        {}", report.scan_id);
    if let Some(ms) = report.duration_ms() {
        let _ = writeln!(out, "Duration:       {:.2}s", ms as f64 / 1000.0);
    }
    let _ = writeln!(out, "Files scanned:  {}", report.total_scanned);
    let _ = writeln!(out, "Threats found:  {}", report.threats_found());
    let _ = writeln!(out, "Skipped:        {}", report.skipped.len());
    let _ = writeln!(out, "Errors:         {}", report.errors.len());

    if report.is_clean() {
        let _ = writeln!(out, "\nNo threats found.");
    } else {
        let _ = writeln!(out, "\nInfected files:");
        for detection in &report.detections {
            let _ = writeln!(
                out,
                "  {}  [signature #{}: {}]",
                detection.path.display(),
                detection.signature_index,
                detection.signature
            );
            if let Some(hash) = &detection.sha256 {
                let _ = writeln!(out, "      sha256 {}", hash);
            }
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out, "\nSkipped files:");
        for skipped in &report.skipped {
            let _ = writeln!(out, "  {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    if !report.errors.is_empty() {
        let _ = writeln!(out, "\nCould not scan:");
        for issue in &report.errors {
            match &issue.path {
                Some(path) => {
                    let _ = writeln!(out, "  [{}] {}: {}", issue.kind, path.display(), issue.message);
                }
                None => {
                    let _ = writeln!(out, "  [{}] {}", issue.kind, issue.message);
                }
            }
        }
    }

    if let Some(summary) = quarantine {
        let _ = writeln!(out, "\nQuarantine:");
        for moved in &summary.moved {
            let _ = writeln!(
                out,
                "  moved {} -> {}",
                moved.original.display(),
                moved.destination.display()
            );
        }
        for failed in &summary.failed {
            let _ = writeln!(out, "  failed {}: {}", failed.path.display(), failed.message);
        }
    }

    out
}
