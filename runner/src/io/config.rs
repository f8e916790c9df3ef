//! Backend configuration stored in `hrd.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file, resolved against the current directory.
pub const DEFAULT_CONFIG_PATH: &str = "hrd.toml";

/// How to reach the Python HRProfiler installation (TOML).
///
/// Every field is optional; a missing file yields the defaults, which run
/// `python3` from `PATH` and wait for the analysis without a deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Interpreter argv prefix (e.g. `["conda","run","-n","hrd","python"]`).
    pub python: Vec<String>,

    /// Kill the analysis after this many seconds. Unset waits indefinitely.
    pub timeout_secs: Option<u64>,

    /// Tee analysis stdout/stderr into this file as well as the console.
    pub log_path: Option<PathBuf>,

    /// Bytes of analysis stderr kept for error reporting.
    pub stderr_tail_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            python: vec!["python3".to_string()],
            timeout_secs: None,
            log_path: None,
            stderr_tail_bytes: 16 * 1024,
        }
    }
}

impl BackendConfig {
    pub fn validate(&self) -> Result<()> {
        if self.python.is_empty() || self.python[0].trim().is_empty() {
            return Err(anyhow!("python must be a non-empty array"));
        }
        if self.timeout_secs == Some(0) {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.stderr_tail_bytes == 0 {
            return Err(anyhow!("stderr_tail_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BackendConfig::default()`.
pub fn load_config(path: &Path) -> Result<BackendConfig> {
    if !path.exists() {
        let cfg = BackendConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BackendConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
///
/// Nothing in the binary writes config; tests use this to point the backend
/// at stand-in interpreters.
#[cfg(any(test, feature = "test-support"))]
pub fn write_config(path: &Path, cfg: &BackendConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

#[cfg(any(test, feature = "test-support"))]
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
