//! The merged sync report printed at the end of every run.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncResult;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

pub const DOWNLOAD_FAILED_MESSAGE: &str = "Failed to download statement(s).";
pub const IMPORT_FAILED_MESSAGE: &str = "Failed to import statement(s) to Pohoda.";
pub const IMPORT_SUCCEEDED_MESSAGE: &str = "Statement(s) successfully imported to Pohoda.";

/// Artifacts collected as the pipeline progresses.
///
/// A key is omitted when its stage was not reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncArtifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_statement: Option<Vec<PathBuf>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloader_report: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importer_report: Option<Value>,
}

/// Top-level output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Creation time.
    pub timestamp: DateTime<Local>,

    /// `"success"`, `"error"`, or the importer's own status.
    pub status: String,

    pub message: String,

    pub artifacts: SyncArtifacts,

    /// Reserved.
    #[serde(default)]
    pub metrics: Map<String, Value>,
}

impl SyncReport {
    /// Empty error report stamped with the current time.
    pub fn new() -> Self {
        Self {
            timestamp: Local::now(),
            status: STATUS_ERROR.to_string(),
            message: String::new(),
            artifacts: SyncArtifacts::default(),
            metrics: Map::new(),
        }
    }

    pub fn fail(&mut self, message: &str) {
        self.status = STATUS_ERROR.to_string();
        self.message = message.to_string();
    }

    /// Take status and message from the importer report, defaulting to success.
    pub fn succeed_with(&mut self, importer_report: &Value) {
        self.status = importer_report
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(STATUS_SUCCESS)
            .to_string();
        self.message = importer_report
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(IMPORT_SUCCEEDED_MESSAGE)
            .to_string();
    }

    /// Pretty-printed JSON document.
    pub fn to_pretty_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_artifacts_are_omitted() {
        let mut report = SyncReport::new();
        report.fail(DOWNLOAD_FAILED_MESSAGE);

        let value: Value = serde_json::from_str(&report.to_pretty_json().unwrap()).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], DOWNLOAD_FAILED_MESSAGE);
        assert_eq!(value["artifacts"], json!({}));
        assert_eq!(value["metrics"], json!({}));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn succeed_with_copies_importer_status() {
        let mut report = SyncReport::new();
        report.succeed_with(&json!({ "status": "warning", "message": "2 skipped" }));
        assert_eq!(report.status, "warning");
        assert_eq!(report.message, "2 skipped");
    }

    #[test]
    fn succeed_with_defaults_when_fields_missing() {
        let mut report = SyncReport::new();
        report.succeed_with(&json!({ "imported": 3 }));
        assert_eq!(report.status, STATUS_SUCCESS);
        assert_eq!(report.message, IMPORT_SUCCEEDED_MESSAGE);
    }

    #[test]
    fn output_is_pretty_printed() {
        let json = SyncReport::new().to_pretty_json().unwrap();
        assert!(json.contains('\n'));
        assert!(json.starts_with("{\n  \"timestamp\""));
    }

    #[test]
    fn roundtrips_through_serde() {
        let mut report = SyncReport::new();
        report.artifacts.imported_statement = Some(vec![PathBuf::from("/tmp/a.abo")]);
        report.artifacts.importer_report = Some(json!({ "status": "success" }));
        report.succeed_with(&json!({ "status": "success", "message": "done" }));

        let parsed: SyncReport = serde_json::from_str(&report.to_pretty_json().unwrap()).unwrap();
        assert_eq!(parsed, report);
    }
}
