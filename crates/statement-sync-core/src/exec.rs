//! External command execution.
//!
//! Adapters describe an invocation as a [`CommandSpec`] and hand it to a
//! [`CommandExecutor`]. [`ProcessExecutor`] spawns real processes; tests
//! swap in [`crate::fakes::ScriptedExecutor`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;

use crate::env::EnvOverlay;
use crate::error::{SyncError, SyncResult};

/// One external invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    /// Label used in logs and errors.
    pub tool: String,

    /// Executable to run.
    pub program: PathBuf,

    /// Arguments, in order.
    pub args: Vec<String>,

    /// Variables layered over the inherited environment.
    pub envs: EnvOverlay,

    /// Wall-clock limit; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Create a spec with no arguments, overlay or timeout.
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            envs: EnvOverlay::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Merge `envs` into the overlay; later values win.
    pub fn envs(mut self, envs: &EnvOverlay) -> Self {
        self.envs
            .extend(envs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Captured result of a finished invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a [`CommandSpec`] to completion.
///
/// Implementations return `Err` only when the process could not be run at
/// all (spawn failure, timeout). A non-zero exit is reported through
/// [`CommandOutput::exit_code`].
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> SyncResult<CommandOutput>;
}

/// Executor backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, spec: &CommandSpec) -> SyncResult<CommandOutput> {
        let start = Instant::now();

        tracing::debug!(
            tool = %spec.tool,
            program = %spec.program.display(),
            args = ?spec.args,
            "Spawning external tool"
        );

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SyncError::Spawn {
                tool: spec.tool.clone(),
                source,
            })?;

        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| SyncError::Timeout {
                    tool: spec.tool.clone(),
                    timeout_secs: limit.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// How to launch one external tool: an executable plus leading arguments,
/// e.g. `php /path/to/importer.php`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub prefix_args: Vec<String>,
}

impl ToolCommand {
    /// Launch `program` directly.
    pub fn direct(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Launch `script` through `interpreter`.
    pub fn script(interpreter: impl Into<PathBuf>, script: &Path) -> Self {
        Self {
            program: interpreter.into(),
            prefix_args: vec![script.to_string_lossy().into_owned()],
        }
    }

    /// Start a [`CommandSpec`] for this tool.
    pub fn spec(&self, tool: &str) -> CommandSpec {
        CommandSpec::new(tool, self.program.clone()).args(self.prefix_args.iter().cloned())
    }
}

/// Resolve `relative` under the user's home directory.
///
/// Falls back to the relative path itself when no home directory is known.
pub fn home_path(relative: &str) -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(relative),
        None => PathBuf::from(relative),
    }
}
