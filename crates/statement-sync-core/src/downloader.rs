//! Statement downloader adapter.
//!
//! Runs the CSAS statement downloader for a date range and reads its JSON
//! report from stdout. Downloaded file paths are recovered from the
//! `artifacts.processed_files` entries, each formatted as
//! `"Processed <path>: <detail>"`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use crate::env::EnvOverlay;
use crate::error::{StageFailure, SyncError, SyncResult};
use crate::exec::{home_path, CommandExecutor, ToolCommand};

/// Tool label used in logs and errors.
pub const DOWNLOADER_TOOL: &str = "csas-statement-downloader";

/// Conventional script location under the user's home directory.
pub const DEFAULT_DOWNLOADER_SCRIPT: &str =
    "Projects/VitexSoftware/csas-statement-tools/src/csas-statement-downloader.php";

/// Report format requested from the downloader.
pub const STATEMENT_FORMAT: &str = "abo-standard";

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Create a range; `from` must not be after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> SyncResult<Self> {
        if from > to {
            return Err(SyncError::InvalidDateRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn start(&self) -> NaiveDate {
        self.from
    }

    pub fn end(&self) -> NaiveDate {
        self.to
    }
}

/// Successful download.
#[derive(Debug, Clone, PartialEq)]
pub struct Downloaded {
    /// Statement files, in report order. May be empty.
    pub files: Vec<PathBuf>,

    /// Full downloader report.
    pub report: Value,
}

fn processed_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Processed ([^:]+):").expect("pattern is a valid regex"))
}

/// Extract the file path from one `processed_files` entry.
///
/// Returns `None` when the entry does not follow `Processed <path>:`.
pub fn parse_processed_entry(entry: &str) -> Option<PathBuf> {
    processed_pattern()
        .captures(entry)
        .and_then(|caps| caps.get(1))
        .map(|m| PathBuf::from(m.as_str()))
}

/// Extract every statement path from a downloader report.
///
/// A report without `artifacts.processed_files` yields an empty list. Any
/// entry that is not a string, or does not follow the `Processed <path>:`
/// format, is a report-format error.
pub fn extract_processed_files(report: &Value) -> SyncResult<Vec<PathBuf>> {
    let Some(entries) = report.pointer("/artifacts/processed_files") else {
        return Ok(Vec::new());
    };
    let entries = entries.as_array().ok_or_else(|| SyncError::ReportFormat {
        tool: DOWNLOADER_TOOL.to_string(),
        reason: "artifacts.processed_files is not an array".to_string(),
    })?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .and_then(parse_processed_entry)
                .ok_or_else(|| SyncError::ReportFormat {
                    tool: DOWNLOADER_TOOL.to_string(),
                    reason: format!("unrecognised processed_files entry: {entry}"),
                })
        })
        .collect()
}

/// Downloader invocation settings.
#[derive(Debug, Clone)]
pub struct Downloader {
    pub tool: ToolCommand,
    pub timeout: Option<Duration>,
}

impl Default for Downloader {
    fn default() -> Self {
        Self {
            tool: ToolCommand::script("php", &home_path(DEFAULT_DOWNLOADER_SCRIPT)),
            timeout: None,
        }
    }
}

impl Downloader {
    pub fn new(tool: ToolCommand, timeout: Option<Duration>) -> Self {
        Self { tool, timeout }
    }

    /// Download statements for `range` into `output_dir`.
    pub async fn download(
        &self,
        executor: &dyn CommandExecutor,
        range: &DateRange,
        output_dir: &Path,
        env: &EnvOverlay,
    ) -> Result<Downloaded, StageFailure> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            tracing::error!(dir = %output_dir.display(), error = %e, "Cannot create output directory");
            StageFailure::bare(e.into())
        })?;

        let spec = self
            .tool
            .spec(DOWNLOADER_TOOL)
            .arg(format!("-d{}", output_dir.display()))
            .arg(format!("-f{STATEMENT_FORMAT}"))
            .args(["-o", "php://stdout"])
            .arg("--from")
            .arg(range.start().format("%Y-%m-%d").to_string())
            .arg("--to")
            .arg(range.end().format("%Y-%m-%d").to_string())
            .envs(env)
            .timeout(self.timeout);

        let output = executor.run(&spec).await.map_err(|e| {
            tracing::error!(tool = DOWNLOADER_TOOL, error = %e, "Error running downloader");
            StageFailure::bare(e)
        })?;

        if !output.success() {
            tracing::error!(
                tool = DOWNLOADER_TOOL,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim_end(),
                "Error downloading statements"
            );
            return Err(StageFailure::bare(SyncError::NonZeroExit {
                tool: DOWNLOADER_TOOL.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            }));
        }

        let report: Value = serde_json::from_str(&output.stdout).map_err(|e| {
            tracing::error!(tool = DOWNLOADER_TOOL, error = %e, "Error parsing downloader report");
            StageFailure::bare(SyncError::ReportFormat {
                tool: DOWNLOADER_TOOL.to_string(),
                reason: e.to_string(),
            })
        })?;
        if !report.is_object() {
            tracing::error!(tool = DOWNLOADER_TOOL, report = %report, "Downloader report is not a JSON object");
            return Err(StageFailure::bare(SyncError::ReportFormat {
                tool: DOWNLOADER_TOOL.to_string(),
                reason: format!("expected a JSON object, got {report}"),
            }));
        }

        match extract_processed_files(&report) {
            Ok(files) => {
                tracing::info!(tool = DOWNLOADER_TOOL, count = files.len(), files = ?files, "Downloaded statements");
                Ok(Downloaded { files, report })
            }
            Err(e) => {
                tracing::error!(tool = DOWNLOADER_TOOL, error = %e, "Error reading downloader report");
                Err(StageFailure::with_report(e, report))
            }
        }
    }
}
