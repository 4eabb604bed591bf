//! Dotenv-style environment overlay.
//!
//! The overlay is applied on top of the inherited process environment for
//! every external tool invocation. The format is deliberately small:
//!
//! - blank lines and lines starting with `#` are skipped
//! - `KEY=VALUE` is split on the first `=`, both sides trimmed
//! - no quoting, escaping or multi-line values

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SyncResult;

/// Default overlay file, relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Variable name to value, in key order.
pub type EnvOverlay = BTreeMap<String, String>;

/// Parse dotenv-style text into an overlay.
pub fn parse_env(text: &str) -> EnvOverlay {
    let mut vars = EnvOverlay::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            vars.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    vars
}

/// Load an overlay from `path`. A missing file yields an empty overlay.
pub fn load_env_file(path: &Path) -> SyncResult<EnvOverlay> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let vars = parse_env(&text);
            tracing::debug!(path = %path.display(), count = vars.len(), "Loaded env overlay");
            Ok(vars)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No env file, using empty overlay");
            Ok(EnvOverlay::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Where a pipeline gets its overlay from.
///
/// A file source is read at the start of every run so that an unreadable
/// file fails that run like any other download-stage error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Overlay(EnvOverlay),
    File(PathBuf),
}

impl EnvSource {
    /// Produce the overlay, reading the file if needed.
    pub fn resolve(&self) -> SyncResult<EnvOverlay> {
        match self {
            EnvSource::Overlay(vars) => Ok(vars.clone()),
            EnvSource::File(path) => load_env_file(path),
        }
    }
}

impl From<EnvOverlay> for EnvSource {
    fn from(vars: EnvOverlay) -> Self {
        EnvSource::Overlay(vars)
    }
}

impl From<PathBuf> for EnvSource {
    fn from(path: PathBuf) -> Self {
        EnvSource::File(path)
    }
}
