//! Error taxonomy for statement synchronisation.

use serde_json::Value;

/// Broad category of a [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The external tool could not be started, timed out or exited non-zero.
    Invocation,
    /// The tool exited cleanly but its report is missing or malformed.
    ReportFormat,
    /// A stage produced nothing the next stage can work with.
    Pipeline,
}

/// Errors produced while driving the external tools.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    #[error("{tool} exited with code {exit_code}: {stderr}")]
    NonZeroExit {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("{tool} report is unusable: {reason}")]
    ReportFormat { tool: String, reason: String },

    #[error("no statement files to import")]
    NoStatements,

    #[error("invalid date range: {from} is after {to}")]
    InvalidDateRange {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Spawn { .. } | SyncError::Timeout { .. } | SyncError::NonZeroExit { .. } => {
                ErrorKind::Invocation
            }
            SyncError::ReportFormat { .. } | SyncError::Json(_) => ErrorKind::ReportFormat,
            SyncError::NoStatements | SyncError::InvalidDateRange { .. } | SyncError::Io(_) => {
                ErrorKind::Pipeline
            }
        }
    }
}

/// Result type for statement-sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// A failed stage, together with whatever report the tool managed to emit.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct StageFailure {
    #[source]
    pub error: SyncError,

    /// Parsed tool report, when the failure happened after parsing it.
    pub report: Option<Value>,
}

impl StageFailure {
    /// Failure with no usable report.
    pub fn bare(error: SyncError) -> Self {
        Self {
            error,
            report: None,
        }
    }

    /// Failure that still carries the parsed report.
    pub fn with_report(error: SyncError, report: Value) -> Self {
        Self {
            error,
            report: Some(report),
        }
    }
}

impl From<SyncError> for StageFailure {
    fn from(error: SyncError) -> Self {
        Self::bare(error)
    }
}
