//! Download-then-import orchestration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::downloader::{DateRange, Downloader, DOWNLOADER_TOOL};
use crate::env::{EnvOverlay, EnvSource};
use crate::error::StageFailure;
use crate::exec::CommandExecutor;
use crate::importer::{Importer, PohodaTarget, IMPORTER_TOOL};
use crate::report::{SyncReport, DOWNLOAD_FAILED_MESSAGE, IMPORT_FAILED_MESSAGE};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncExit {
    Success,
    DownloadFailed,
    ImportFailed,
}

impl SyncExit {
    /// Process exit code.
    pub fn code(self) -> i32 {
        match self {
            SyncExit::Success => 0,
            SyncExit::DownloadFailed => 1,
            SyncExit::ImportFailed => 2,
        }
    }
}

/// Inputs for one run.
///
/// The dates are checked when the run starts; an inverted range fails the
/// download stage.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub output_dir: PathBuf,
    pub target: PohodaTarget,
}

/// Report plus exit status of a run.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub report: SyncReport,
    pub exit: SyncExit,
}

/// Runs the downloader, then the importer, and merges both reports.
pub struct SyncPipeline {
    executor: Arc<dyn CommandExecutor>,
    downloader: Downloader,
    importer: Importer,
    env: EnvSource,
}

impl SyncPipeline {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        downloader: Downloader,
        importer: Importer,
        env: impl Into<EnvSource>,
    ) -> Self {
        Self {
            executor,
            downloader,
            importer,
            env: env.into(),
        }
    }

    /// Resolve the overlay and the date range before any tool runs.
    fn prepare(&self, request: &SyncRequest) -> Result<(DateRange, EnvOverlay), StageFailure> {
        let range = DateRange::new(request.from_date, request.to_date)?;
        let env = self.env.resolve()?;
        Ok((range, env))
    }

    /// Execute one run. Never fails: every failure is folded into the report.
    pub async fn run(&self, request: &SyncRequest) -> SyncOutcome {
        let start = Instant::now();
        let mut report = SyncReport::new();

        info!(
            event = "stage.started",
            stage = DOWNLOADER_TOOL,
            from = %request.from_date,
            to = %request.to_date,
            output_dir = %request.output_dir.display(),
        );
        let (range, env) = match self.prepare(request) {
            Ok(prepared) => prepared,
            Err(failure) => {
                warn!(event = "stage.failed", stage = DOWNLOADER_TOOL, error = %failure);
                report.fail(DOWNLOAD_FAILED_MESSAGE);
                return finish(report, SyncExit::DownloadFailed, start);
            }
        };

        let downloaded = self
            .downloader
            .download(self.executor.as_ref(), &range, &request.output_dir, &env)
            .await;

        let (files, downloader_report) = match downloaded {
            Ok(d) => (d.files, Some(d.report)),
            Err(failure) => {
                warn!(event = "stage.failed", stage = DOWNLOADER_TOOL, error = %failure);
                (Vec::new(), failure.report)
            }
        };
        report.artifacts.downloader_report = downloader_report;

        if files.is_empty() {
            report.fail(DOWNLOAD_FAILED_MESSAGE);
            return finish(report, SyncExit::DownloadFailed, start);
        }
        info!(event = "stage.finished", stage = DOWNLOADER_TOOL, files = files.len());
        report.artifacts.imported_statement = Some(files.clone());

        info!(event = "stage.started", stage = IMPORTER_TOOL, files = files.len());
        let imported = match self
            .importer
            .import(self.executor.as_ref(), &files, &request.target, &env)
            .await
        {
            Ok(imported) => imported,
            Err(failure) => {
                warn!(event = "stage.failed", stage = IMPORTER_TOOL, error = %failure);
                report.fail(IMPORT_FAILED_MESSAGE);
                return finish(report, SyncExit::ImportFailed, start);
            }
        };
        info!(event = "stage.finished", stage = IMPORTER_TOOL);

        report.succeed_with(&imported.report);
        report.artifacts.importer_report = Some(imported.report);
        finish(report, SyncExit::Success, start)
    }
}

fn finish(report: SyncReport, exit: SyncExit, start: Instant) -> SyncOutcome {
    info!(
        event = "sync.finished",
        status = %report.status,
        exit_code = exit.code(),
        duration_ms = start.elapsed().as_millis() as u64,
    );
    SyncOutcome { report, exit }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        assert_eq!(SyncExit::Success.code(), 0);
        assert_eq!(SyncExit::DownloadFailed.code(), 1);
        assert_eq!(SyncExit::ImportFailed.code(), 2);
    }
}
