//! Analysis abstraction for the delegated HRProfiler call.
//!
//! The [`Analysis`] trait decouples the CLI driver from the actual backend
//! (currently the Python `HRProfiler` package). Tests use fakes that record
//! requests or fail on demand without spawning processes.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::core::params::AnalysisRequest;
use crate::io::config::BackendConfig;
use crate::io::process::{CommandOutput, run_command_streaming};

/// Python run by the interpreter: reads keyword arguments from stdin, calls
/// `HRProfiler(**kwargs)` and writes an [`AnalysisOutcome`] to `argv[1]`.
const SHIM: &str = include_str!("../../shim/hrprofiler_shim.py");

const OUTCOME_FILE: &str = "outcome.json";

/// Abstraction over analysis backends.
pub trait Analysis {
    /// Perform the analysis once. Any error means the analysis failed.
    fn run(&self, request: &AnalysisRequest) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Completed,
    Failed,
}

/// Result reported by the shim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub status: OutcomeStatus,
    /// `str(exc)` of the raised exception when `status` is `failed`.
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend that runs HRProfiler through a Python interpreter.
pub struct HrProfilerBackend {
    config: BackendConfig,
}

impl HrProfilerBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    fn command(&self, outcome_path: &Path) -> Command {
        let mut parts = self.config.python.iter();
        let program = parts.next().map(String::as_str).unwrap_or("python3");
        let mut cmd = Command::new(program);
        cmd.args(parts).arg("-c").arg(SHIM).arg(outcome_path);
        cmd
    }
}

impl Analysis for HrProfilerBackend {
    #[instrument(skip_all, fields(result_dir = %request.result_dir.display()))]
    fn run(&self, request: &AnalysisRequest) -> Result<()> {
        let interpreter = self.config.python.join(" ");
        info!(%interpreter, "starting HRProfiler");

        let payload = serde_json::to_vec(request).context("serialize analysis request")?;
        let scratch = tempfile::tempdir().context("create scratch dir")?;
        let outcome_path = scratch.path().join(OUTCOME_FILE);

        let output = run_command_streaming(
            self.command(&outcome_path),
            Some(&payload),
            self.config.timeout(),
            self.config.stderr_tail_bytes,
            self.config.log_path.as_deref(),
        )
        .with_context(|| format!("run {interpreter}"))?;

        let outcome = read_outcome(&outcome_path)?;
        resolve_outcome(&output, outcome)
    }
}

/// Load the shim's outcome. A missing file means the shim never got that far.
fn read_outcome(path: &Path) -> Result<Option<AnalysisOutcome>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read analysis outcome {}", path.display()))?;
    let outcome =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(outcome))
}

fn resolve_outcome(output: &CommandOutput, outcome: Option<AnalysisOutcome>) -> Result<()> {
    if output.timed_out {
        debug!("HRProfiler timed out");
        bail!("HRProfiler timed out and was killed");
    }

    match outcome {
        Some(AnalysisOutcome {
            status: OutcomeStatus::Failed,
            message,
        }) => {
            debug!("HRProfiler raised an exception");
            Err(anyhow!(
                message.unwrap_or_else(|| "HRProfiler failed without a message".to_string())
            ))
        }
        Some(AnalysisOutcome {
            status: OutcomeStatus::Completed,
            ..
        }) if output.status.success() => {
            debug!("HRProfiler completed successfully");
            Ok(())
        }
        Some(_) => Err(anyhow!(
            "HRProfiler completed but the interpreter failed ({})",
            output.status
        )),
        None => {
            debug!(exit_code = ?output.status.code(), "no analysis outcome");
            match output.stderr_last_line() {
                Some(line) => Err(anyhow!(
                    "HRProfiler interpreter failed ({}): {line}",
                    output.status
                )),
                None => Err(anyhow!(
                    "HRProfiler interpreter exited without reporting an outcome ({})",
                    output.status
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::RunParams;
    use std::path::PathBuf;

    fn request() -> AnalysisRequest {
        AnalysisRequest::from_params(&RunParams::with_defaults(
            PathBuf::from("vcf"),
            PathBuf::from("segments"),
            PathBuf::from("results"),
        ))
    }

    /// Backend whose "interpreter" is a shell script.
    ///
    /// The appended `-c <shim> <outcome>` arrive as `$1 $2 $3`.
    #[cfg(unix)]
    fn sh_backend(script: &str) -> HrProfilerBackend {
        HrProfilerBackend::new(BackendConfig {
            python: vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
            ],
            ..BackendConfig::default()
        })
    }

    #[test]
    fn command_appends_shim_after_interpreter_prefix() {
        let backend = HrProfilerBackend::new(BackendConfig {
            python: vec!["conda".into(), "run".into(), "python".into()],
            ..BackendConfig::default()
        });
        let cmd = backend.command(Path::new("/tmp/outcome.json"));
        assert_eq!(cmd.get_program(), "conda");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args.len(), 5);
        assert_eq!(args[0], "run");
        assert_eq!(args[1], "python");
        assert_eq!(args[2], "-c");
        assert_eq!(args[3], SHIM);
        assert_eq!(args[4], "/tmp/outcome.json");
    }

    #[test]
    fn shim_calls_hrprofiler_with_kwargs() {
        assert!(SHIM.contains("from HRProfiler.scripts import HRProfiler as HR"));
        assert!(SHIM.contains("HR.HRProfiler(**kwargs)"));
    }

    #[test]
    fn outcome_parses_failed_message() {
        let outcome: AnalysisOutcome =
            serde_json::from_str(r#"{"status":"failed","message":"boom"}"#).expect("parse");
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.message.as_deref(), Some("boom"));

        let outcome: AnalysisOutcome =
            serde_json::from_str(r#"{"status":"completed"}"#).expect("parse");
        assert_eq!(outcome.message, None);
    }

    #[cfg(unix)]
    #[test]
    fn completed_outcome_succeeds_and_request_reaches_stdin() {
        let temp = tempfile::tempdir().expect("tempdir");
        let capture = temp.path().join("request.json");
        let backend = sh_backend(&format!(
            r#"cat > '{}'; printf '{{"status":"completed"}}' > "$3""#,
            capture.display()
        ));

        backend.run(&request()).expect("analysis");

        let captured = fs::read_to_string(&capture).expect("read capture");
        let parsed: AnalysisRequest = serde_json::from_str(&captured).expect("parse capture");
        assert_eq!(parsed, request());
    }

    #[cfg(unix)]
    #[test]
    fn failed_outcome_reports_exception_text() {
        let backend = sh_backend(
            r#"cat >/dev/null; printf '{"status":"failed","message":"No VCF files found in vcf"}' > "$3"; exit 1"#,
        );
        let err = backend.run(&request()).expect_err("analysis should fail");
        assert_eq!(format!("{err:#}"), "No VCF files found in vcf");
    }

    #[cfg(unix)]
    #[test]
    fn crash_without_outcome_reports_last_stderr_line() {
        let backend = sh_backend(
            r#"cat >/dev/null; echo 'Traceback (most recent call last):' >&2; echo "ModuleNotFoundError: No module named 'HRProfiler'" >&2; exit 1"#,
        );
        let err = backend.run(&request()).expect_err("analysis should fail");
        let message = format!("{err:#}");
        assert!(message.contains("exit status: 1"));
        assert!(message.contains("ModuleNotFoundError: No module named 'HRProfiler'"));
    }

    #[cfg(unix)]
    #[test]
    fn completed_outcome_with_failing_status_is_an_error() {
        let backend = sh_backend(r#"cat >/dev/null; printf '{"status":"completed"}' > "$3"; exit 2"#);
        let err = backend.run(&request()).expect_err("analysis should fail");
        assert!(err.to_string().contains("exit status: 2"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_analysis() {
        let backend = HrProfilerBackend::new(BackendConfig {
            timeout_secs: Some(1),
            ..sh_backend("exec sleep 10").config
        });
        let err = backend.run(&request()).expect_err("analysis should time out");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn missing_interpreter_names_it() {
        let backend = HrProfilerBackend::new(BackendConfig {
            python: vec!["no-such-python-for-hrd".to_string()],
            ..BackendConfig::default()
        });
        let err = backend.run(&request()).expect_err("spawn should fail");
        assert!(format!("{err:#}").contains("no-such-python-for-hrd"));
    }
}
