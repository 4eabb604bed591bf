//! statement-sync core
//!
//! Downloads CSAS bank statements with `csas-statement-downloader` and
//! imports them into Pohoda with `pohoda-abo-importer`, merging both tool
//! reports into one [`SyncReport`]:
//!
//! - [`env`]: dotenv-style overlay applied to every tool invocation
//! - [`exec`]: the [`CommandExecutor`] seam around child processes
//! - [`downloader`] / [`importer`]: one adapter per external tool
//! - [`pipeline`]: sequencing, report merging and exit codes

pub mod downloader;
pub mod env;
pub mod error;
pub mod exec;
pub mod fakes;
pub mod importer;
pub mod pipeline;
pub mod report;
pub mod telemetry;

pub use downloader::{extract_processed_files, parse_processed_entry, DateRange, Downloaded, Downloader};
pub use env::{load_env_file, parse_env, EnvOverlay, EnvSource, DEFAULT_ENV_FILE};
pub use error::{ErrorKind, StageFailure, SyncError, SyncResult};
pub use exec::{home_path, CommandExecutor, CommandOutput, CommandSpec, ProcessExecutor, ToolCommand};
pub use importer::{Imported, Importer, PohodaTarget};
pub use pipeline::{SyncExit, SyncOutcome, SyncPipeline, SyncRequest};
pub use report::{SyncArtifacts, SyncReport};
pub use telemetry::init_tracing;
