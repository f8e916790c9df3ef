//! One HRProfiler run: parameter summary, a single analysis call, and the
//! completion or failure report.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::params::{AnalysisRequest, RunParams};
use crate::core::report::{write_banner, write_failure, write_success};
use crate::exit_codes;
use crate::io::analysis::Analysis;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The analysis returned normally.
    Completed,
    /// `--dry-run`: the request was printed and no analysis was started.
    DryRun,
    /// The analysis failed; carries the reported message.
    Failed(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed | RunOutcome::DryRun => exit_codes::OK,
            RunOutcome::Failed(_) => exit_codes::FAILED,
        }
    }
}

/// Print the parameter summary, then call `analysis` exactly once.
///
/// Every analysis error collapses to [`RunOutcome::Failed`] with its full
/// message written to `err`. Errors returned from this function are console
/// write failures only.
#[instrument(skip_all, fields(output_dir = %params.output_dir.display(), dry_run = dry_run))]
pub fn run_profiler<A, O, E>(
    params: &RunParams,
    analysis: &A,
    dry_run: bool,
    out: &mut O,
    err: &mut E,
) -> Result<RunOutcome>
where
    A: Analysis + ?Sized,
    O: Write,
    E: Write,
{
    write_banner(out, params).context("write parameter summary")?;
    let request = AnalysisRequest::from_params(params);

    if dry_run {
        let mut payload =
            serde_json::to_string_pretty(&request).context("serialize analysis request")?;
        payload.push('\n');
        out.write_all(payload.as_bytes())
            .context("write analysis request")?;
        out.flush().context("flush stdout")?;
        return Ok(RunOutcome::DryRun);
    }

    // The banner must be visible before the analysis starts printing.
    out.flush().context("flush stdout")?;

    match analysis.run(&request) {
        Ok(()) => {
            debug!("analysis returned normally");
            write_success(out, &params.output_dir).context("write completion summary")?;
            out.flush().context("flush stdout")?;
            Ok(RunOutcome::Completed)
        }
        Err(e) => {
            let message = format!("{e:#}");
            debug!(err = %message, "analysis failed");
            write_failure(err, &message).context("write failure report")?;
            err.flush().context("flush stderr")?;
            Ok(RunOutcome::Failed(message))
        }
    }
}
