//! In-memory executor fake (testing only)
//!
//! `ScriptedExecutor` satisfies [`CommandExecutor`] without spawning
//! anything: each call pops the next queued [`ScriptedRun`] and records the
//! spec it was given.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::exec::{CommandExecutor, CommandOutput, CommandSpec};

/// One canned response.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRun {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,

    /// Written to the path following `-o` before returning, mimicking a tool
    /// that writes its report to a file.
    pub report_file: Option<String>,

    /// Fail to spawn instead of producing output.
    pub spawn_error: bool,
}

impl ScriptedRun {
    /// Exit 0 with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Exit with `exit_code` and the given stderr.
    pub fn fail(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Exit 0 after writing `report` to the `-o` path.
    pub fn writes_report(report: impl Into<String>) -> Self {
        Self {
            report_file: Some(report.into()),
            ..Default::default()
        }
    }

    pub fn spawn_error() -> Self {
        Self {
            spawn_error: true,
            ..Default::default()
        }
    }
}

/// Executor that replays queued responses in order.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    runs: Mutex<VecDeque<ScriptedRun>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedExecutor {
    pub fn new(runs: impl IntoIterator<Item = ScriptedRun>) -> Self {
        Self {
            runs: Mutex::new(runs.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every spec passed to [`CommandExecutor::run`] so far.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, spec: &CommandSpec) -> SyncResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let run = self
            .runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted run left for {}", spec.tool));

        if run.spawn_error {
            return Err(SyncError::Spawn {
                tool: spec.tool.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
            });
        }

        if let Some(report) = &run.report_file {
            let path = spec
                .flag_value("-o")
                .unwrap_or_else(|| panic!("{} was not given an -o path", spec.tool));
            std::fs::write(path, report)?;
        }

        Ok(CommandOutput {
            exit_code: run.exit_code,
            stdout: run.stdout,
            stderr: run.stderr,
            duration_ms: 0,
        })
    }
}
