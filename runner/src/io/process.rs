//! Helpers for running child processes with live console output.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

type SharedLog = Arc<Option<Mutex<BufWriter<File>>>>;

/// Outcome of a streamed child process.
///
/// Stdout is only forwarded, never stored. Stderr is forwarded and its last
/// bytes are kept for error reporting.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stderr_tail: Vec<u8>,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Last non-empty stderr line, e.g. the final line of a Python traceback.
    pub fn stderr_last_line(&self) -> Option<String> {
        String::from_utf8_lossy(&self.stderr_tail)
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Run a command, forwarding its stdout/stderr to ours as lines arrive.
///
/// Both pipes are drained on their own threads so a chatty child never blocks.
/// When `log_path` is set every line is also appended there and flushed.
/// `tail_limit` bounds how much stderr is retained in memory. Without a
/// `timeout` the call blocks until the child exits; with one, the child runs
/// in its own process group and the whole group is killed on expiry.
#[instrument(skip_all, fields(timeout_secs = timeout.map(|t| t.as_secs()), tail_limit, logging = log_path.is_some()))]
pub fn run_command_streaming(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
    tail_limit: usize,
    log_path: Option<&Path>,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    if timeout.is_some() {
        own_process_group(&mut cmd);
    }

    let log: SharedLog = Arc::new(match log_path {
        Some(path) => Some(Mutex::new(open_log(path)?)),
        None => None,
    });

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            debug!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_log = Arc::clone(&log);
    let stdout_handle =
        thread::spawn(move || pump_lines(stdout, io::stdout(), &stdout_log, None));
    let stderr_log = Arc::clone(&log);
    let stderr_handle =
        thread::spawn(move || pump_lines(stderr, io::stderr(), &stderr_log, Some(tail_limit)));

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        match child_stdin.write_all(input) {
            Ok(()) => {}
            // The child exited before reading; its status tells the story.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("child closed stdin early");
            }
            Err(e) => return Err(e).context("write stdin"),
        }
    }

    let mut timed_out = false;
    let status = match timeout {
        Some(limit) => match child.wait_timeout(limit).context("wait for command")? {
            Some(status) => status,
            None => {
                debug!(timeout_secs = limit.as_secs(), "command timed out, killing");
                timed_out = true;
                kill_process_group(&mut child)?;
                child.wait().context("wait command after kill")?
            }
        },
        None => child.wait().context("wait for command")?,
    };

    join_output(stdout_handle).context("join stdout")?;
    let (stderr_tail, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if let Some(ref mutex) = *log
        && let Ok(mut writer) = mutex.lock()
        && let Err(e) = writer.flush()
    {
        warn!(err = %e, "failed to flush log file");
    }

    debug!(exit_code = ?status.code(), timed_out, stderr_truncated, "command finished");
    Ok(CommandOutput {
        status,
        stderr_tail,
        stderr_truncated,
        timed_out,
    })
}

/// Start the child as leader of a new process group.
///
/// Only done when a timeout is set: a grouped child no longer receives the
/// terminal's Ctrl-C.
#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the child and everything it spawned, e.g. the interpreter behind
/// `conda run`. Grandchildren otherwise keep the output pipes open.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> Result<()> {
    // A negative pid addresses the whole group led by the child.
    let status = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{}", child.id()))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => Ok(()),
        other => {
            warn!(result = ?other, "process group kill failed, killing child only");
            child.kill().context("kill command")
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn open_log(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Copy `reader` to `sink` line by line, tee-ing to the log.
///
/// With `tail_limit` set, returns the last `tail_limit` bytes read and how
/// many earlier bytes were dropped; otherwise nothing is retained.
fn pump_lines<R: Read, W: Write>(
    reader: R,
    mut sink: W,
    log: &SharedLog,
    tail_limit: Option<usize>,
) -> Result<(Vec<u8>, usize)> {
    let mut buf_reader = BufReader::new(reader);
    let mut tail = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        // A closed console must not kill the analysis, so sink errors are logged only.
        if let Err(e) = sink.write_all(&line).and_then(|()| sink.flush()) {
            warn!(err = %e, "failed to forward child output");
        }

        if let Some(ref mutex) = **log
            && let Ok(mut writer) = mutex.lock()
            && let Err(e) = writer.write_all(&line).and_then(|()| writer.flush())
        {
            warn!(err = %e, "failed to write to log file");
        }

        if let Some(limit) = tail_limit {
            tail.extend_from_slice(&line);
            if tail.len() > limit {
                let excess = tail.len() - limit;
                tail.drain(..excess);
                truncated += excess;
            }
        }
    }

    Ok((tail, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn keeps_stderr_tail_and_status() {
        let output = run_command_streaming(
            sh("echo progress; echo first >&2; echo 'ValueError: bad input' >&2; exit 3"),
            None,
            None,
            1024,
            None,
        )
        .expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert!(!output.timed_out);
        assert_eq!(
            output.stderr_last_line().as_deref(),
            Some("ValueError: bad input")
        );
    }

    #[test]
    fn bounds_stderr_tail() {
        let output = run_command_streaming(
            sh("printf 'aaaaaaaaaa\\nbbbb\\n' >&2"),
            None,
            None,
            5,
            None,
        )
        .expect("run");
        assert_eq!(output.stderr_tail, b"bbbb\n".to_vec());
        assert_eq!(output.stderr_truncated, 11);
    }

    #[test]
    fn feeds_stdin_and_tees_to_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let log_path = temp.path().join("logs").join("child.log");
        let output = run_command_streaming(
            sh("cat; echo warn >&2"),
            Some(b"hello\n"),
            None,
            1024,
            Some(&log_path),
        )
        .expect("run");
        assert!(output.status.success());
        let log = std::fs::read_to_string(&log_path).expect("read log");
        assert!(log.contains("hello\n"));
        assert!(log.contains("warn\n"));
    }

    #[test]
    fn kills_child_after_timeout() {
        let output = run_command_streaming(
            sh("exec sleep 5"),
            None,
            Some(Duration::from_millis(100)),
            1024,
            None,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn timeout_kills_grandchildren_holding_pipes() {
        let started = Instant::now();
        let output = run_command_streaming(
            sh("sleep 6; :"),
            None,
            Some(Duration::from_millis(300)),
            1024,
            None,
        )
        .expect("run");
        assert!(output.timed_out);
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_command_streaming(
            Command::new("definitely-not-a-real-binary-hrd"),
            None,
            None,
            1024,
            None,
        )
        .expect_err("spawn should fail");
        assert!(err.to_string().contains("spawn command"));
    }
}
