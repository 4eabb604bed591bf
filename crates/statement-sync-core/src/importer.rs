//! Pohoda ABO importer adapter.
//!
//! The importer writes its JSON report to a file named by `-o` instead of
//! stdout. The adapter hands it a fresh temp file and owns that file through
//! a [`TempPath`], so it is removed on every exit path.

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempPath;

use crate::env::EnvOverlay;
use crate::error::{StageFailure, SyncError};
use crate::exec::{home_path, CommandExecutor, ToolCommand};

/// Tool label used in logs and errors.
pub const IMPORTER_TOOL: &str = "pohoda-abo-importer";

/// Conventional script location under the user's home directory.
pub const DEFAULT_IMPORTER_SCRIPT: &str = "Projects/SpojeNetIT/pohoda-abo-importer/src/importer.php";

/// Variable carrying the Pohoda endpoint to the importer.
pub const POHODA_URL_VAR: &str = "POHODA_URL";

/// Variable carrying the Pohoda credential to the importer.
pub const POHODA_TOKEN_VAR: &str = "POHODA_TOKEN";

/// Pohoda connection details.
#[derive(Clone, PartialEq, Eq)]
pub struct PohodaTarget {
    pub url: String,
    pub token: String,
}

impl std::fmt::Debug for PohodaTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PohodaTarget")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Successful import.
#[derive(Debug)]
pub struct Imported {
    /// Parsed importer report.
    pub report: Value,

    /// Report file; deleted when this value is dropped.
    pub report_path: TempPath,
}

/// Importer invocation settings.
#[derive(Debug, Clone)]
pub struct Importer {
    pub tool: ToolCommand,
    pub timeout: Option<Duration>,
}

impl Default for Importer {
    fn default() -> Self {
        Self {
            tool: ToolCommand::script("php", &home_path(DEFAULT_IMPORTER_SCRIPT)),
            timeout: None,
        }
    }
}

impl Importer {
    pub fn new(tool: ToolCommand, timeout: Option<Duration>) -> Self {
        Self { tool, timeout }
    }

    /// Import `files` into Pohoda.
    pub async fn import(
        &self,
        executor: &dyn CommandExecutor,
        files: &[PathBuf],
        target: &PohodaTarget,
        env: &EnvOverlay,
    ) -> Result<Imported, StageFailure> {
        if files.is_empty() {
            return Err(StageFailure::bare(SyncError::NoStatements));
        }

        let report_path = tempfile::Builder::new()
            .prefix("statement-sync-import-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| {
                tracing::error!(error = %e, "Cannot create importer report file");
                StageFailure::bare(e.into())
            })?
            .into_temp_path();

        let spec = self
            .tool
            .spec(IMPORTER_TOOL)
            .arg("-o")
            .arg(report_path.to_string_lossy())
            .args(files.iter().map(|f| f.to_string_lossy().into_owned()))
            .envs(env)
            .env(POHODA_URL_VAR, target.url.as_str())
            .env(POHODA_TOKEN_VAR, target.token.as_str())
            .timeout(self.timeout);

        let output = executor.run(&spec).await.map_err(|e| {
            tracing::error!(tool = IMPORTER_TOOL, error = %e, "Error running importer");
            StageFailure::bare(e)
        })?;

        if !output.success() {
            tracing::error!(
                tool = IMPORTER_TOOL,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim_end(),
                "Error importing statements to Pohoda"
            );
            return Err(StageFailure::bare(SyncError::NonZeroExit {
                tool: IMPORTER_TOOL.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            }));
        }

        let report = read_report(&report_path).map_err(|e| {
            tracing::error!(tool = IMPORTER_TOOL, error = %e, "Error parsing importer report");
            StageFailure::bare(e)
        })?;

        tracing::info!(tool = IMPORTER_TOOL, report = %report, "Import finished");
        Ok(Imported {
            report,
            report_path,
        })
    }
}

fn read_report(path: &TempPath) -> Result<Value, SyncError> {
    let format_error = |reason: String| SyncError::ReportFormat {
        tool: IMPORTER_TOOL.to_string(),
        reason,
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == IoErrorKind::NotFound => {
            return Err(format_error(format!("report file {} is missing", path.display())))
        }
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        return Err(format_error(format!("report file {} is empty", path.display())));
    }
    let report: Value = serde_json::from_str(&text).map_err(|e| format_error(e.to_string()))?;
    if !report.is_object() {
        return Err(format_error(format!("expected a JSON object, got {report}")));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fakes::{ScriptedExecutor, ScriptedRun};
    use std::path::Path;

    fn importer() -> Importer {
        Importer::new(ToolCommand::script("php", Path::new("/opt/importer.php")), None)
    }

    fn target() -> PohodaTarget {
        PohodaTarget {
            url: "http://pohoda.local:4444".to_string(),
            token: "s3cret".to_string(),
        }
    }

    fn files() -> Vec<PathBuf> {
        vec![PathBuf::from("/tmp/a.abo"), PathBuf::from("/tmp/b.abo")]
    }

    #[tokio::test]
    async fn successful_import_returns_report() {
        let executor = ScriptedExecutor::new([ScriptedRun::writes_report(
            r#"{"status":"success","message":"done"}"#,
        )]);

        let imported = importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap();

        assert_eq!(imported.report["status"], "success");
        assert_eq!(imported.report["message"], "done");
        assert!(imported.report_path.exists());
    }

    #[tokio::test]
    async fn invocation_passes_report_path_then_files() {
        let executor = ScriptedExecutor::new([ScriptedRun::writes_report("{}")]);

        let imported = importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap();

        let calls = executor.calls();
        let spec = &calls[0];
        assert_eq!(spec.args[0], "/opt/importer.php");
        assert_eq!(spec.args[1], "-o");
        assert_eq!(Path::new(&spec.args[2]), &*imported.report_path);
        assert_eq!(&spec.args[3..], &["/tmp/a.abo", "/tmp/b.abo"]);
        assert!(spec.args[2].ends_with(".json"));
    }

    #[tokio::test]
    async fn credentials_override_env_file() {
        let executor = ScriptedExecutor::new([ScriptedRun::writes_report("{}")]);
        let mut env = EnvOverlay::new();
        env.insert(POHODA_URL_VAR.to_string(), "http://stale".to_string());
        env.insert("POHODA_ICO".to_string(), "12345678".to_string());

        importer()
            .import(&executor, &files(), &target(), &env)
            .await
            .unwrap();

        let calls = executor.calls();
        let spec = &calls[0];
        assert_eq!(spec.envs[POHODA_URL_VAR], "http://pohoda.local:4444");
        assert_eq!(spec.envs[POHODA_TOKEN_VAR], "s3cret");
        assert_eq!(spec.envs["POHODA_ICO"], "12345678");
    }

    #[tokio::test]
    async fn empty_file_list_is_rejected() {
        let executor = ScriptedExecutor::default();

        let failure = importer()
            .import(&executor, &[], &target(), &EnvOverlay::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, SyncError::NoStatements));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_is_failure() {
        let executor = ScriptedExecutor::new([ScriptedRun::fail(2, "connection refused")]);

        let failure = importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Invocation);
        assert!(failure.report.is_none());
    }

    #[tokio::test]
    async fn missing_report_is_failure() {
        // Exits 0 without writing anything to the report file.
        let executor = ScriptedExecutor::new([ScriptedRun::ok("")]);

        let failure = importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ReportFormat);
    }

    #[tokio::test]
    async fn malformed_report_is_failure() {
        let executor = ScriptedExecutor::new([ScriptedRun::writes_report("{not json")]);

        let failure = importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::ReportFormat);
    }

    #[tokio::test]
    async fn non_object_report_is_failure() {
        for body in ["null", "[]", "false", "42", "\"done\""] {
            let executor = ScriptedExecutor::new([ScriptedRun::writes_report(body)]);

            let failure = importer()
                .import(&executor, &files(), &target(), &EnvOverlay::new())
                .await
                .unwrap_err();

            assert_eq!(failure.error.kind(), ErrorKind::ReportFormat, "report {body}");
            assert!(failure.report.is_none());
        }
    }

    #[tokio::test]
    async fn report_file_removed_on_failure() {
        let executor = ScriptedExecutor::new([ScriptedRun::fail(1, "boom")]);

        importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap_err();

        let path = executor.calls()[0].flag_value("-o").unwrap().to_string();
        assert!(!Path::new(&path).exists());
    }

    #[tokio::test]
    async fn report_file_removed_when_dropped() {
        let executor = ScriptedExecutor::new([ScriptedRun::writes_report("{}")]);

        let imported = importer()
            .import(&executor, &files(), &target(), &EnvOverlay::new())
            .await
            .unwrap();
        let path = imported.report_path.to_path_buf();
        assert!(path.exists());

        drop(imported);
        assert!(!path.exists());
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", target());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("pohoda.local"));
    }
}
