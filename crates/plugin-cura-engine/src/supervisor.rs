//! Engine process supervision.
//!
//! Runs the engine as a child process and consumes its stderr with a short
//! poll timeout, so exit, cancellation, and the deadline are all noticed
//! even while the engine is silent. Every line goes through the progress
//! parser; progress is forwarded to the caller and analysis fragments are
//! accumulated into the job result.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::SliceError;
use crate::models::{AnalysisResult, EngineInvocation, ProgressUpdate};
use crate::progress::{EngineEvent, ProgressTracker, parse_line};

/// Log target carrying raw engine output.
pub const ENGINE_LOG_TARGET: &str = "plugin_cura_engine::engine";

/// Number of trailing stderr lines kept for failure reports.
pub const STDERR_TAIL_LINES: usize = 20;

/// Callback receiving forwarded progress.
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(ProgressUpdate) + Send);

/// Supervises a single engine run.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    poll_interval: Duration,
    deadline: Option<Duration>,
    log_engine_output: bool,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            deadline: None,
            log_engine_output: false,
        }
    }
}

impl ProcessSupervisor {
    /// Create a supervisor with the given stderr poll tick.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }

    /// Kill the engine if it runs longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Log each engine line on [`ENGINE_LOG_TARGET`].
    pub fn with_engine_logging(mut self, enabled: bool) -> Self {
        self.log_engine_output = enabled;
        self
    }

    /// Run the engine to completion.
    ///
    /// Returns the accumulated analysis, or `None` if the engine never
    /// reported any. A non-zero exit, cancellation, or deadline expiry is an
    /// error; in the latter two cases the child is killed first.
    pub async fn run(
        &self,
        invocation: &EngineInvocation,
        on_progress: ProgressCallback<'_>,
        cancel: CancellationToken,
    ) -> Result<Option<AnalysisResult>, SliceError> {
        if cancel.is_cancelled() {
            return Err(SliceError::Cancelled);
        }

        let mut cmd = Command::new(invocation.program());
        cmd.args(invocation.args())
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        debug!(
            engine = %invocation.program().display(),
            args = invocation.args().len(),
            "Spawning slicing engine"
        );

        let start = Instant::now();
        let launch_err = |reason: String| SliceError::EngineLaunch {
            path: invocation.executable.clone(),
            reason,
        };
        let mut child = cmd.spawn().map_err(|e| launch_err(e.to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| launch_err("stderr was not captured".to_string()))?;

        let deadline = self.deadline;
        let expiry = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        let mut job = JobState::default();
        let mut stream_open = true;
        let mut exit_status: Option<ExitStatus> = None;

        loop {
            let mut idle_after_exit = false;

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Slice cancelled, killing engine");
                    kill(&mut child).await;
                    return Err(SliceError::Cancelled);
                }
                _ = &mut expiry => {
                    let timeout_seconds = deadline.map(|d| d.as_secs()).unwrap_or_default();
                    error!(timeout_s = timeout_seconds, "Slicing engine timed out, killing");
                    kill(&mut child).await;
                    return Err(SliceError::Timeout { timeout_seconds });
                }
                read = tokio::time::timeout(self.poll_interval, reader.read_until(b'\n', &mut buf)), if stream_open => {
                    match read {
                        Ok(Ok(n)) => {
                            if !buf.is_empty() {
                                let line = take_line(&mut buf);
                                job.observe(&line, self.log_engine_output, &mut *on_progress);
                            }
                            if n == 0 {
                                stream_open = false;
                            }
                        }
                        Ok(Err(e)) => {
                            warn!(error = %e, "Engine stderr read failed");
                            stream_open = false;
                        }
                        Err(_) => idle_after_exit = exit_status.is_some(),
                    }
                }
                status = child.wait(), if !stream_open && exit_status.is_none() => {
                    exit_status = Some(status?);
                }
            }

            if exit_status.is_none() {
                exit_status = child.try_wait()?;
            }

            if let Some(status) = exit_status {
                if !stream_open || idle_after_exit {
                    // An unterminated last line stays buffered across polls.
                    if !buf.is_empty() {
                        let line = take_line(&mut buf);
                        job.observe(&line, self.log_engine_output, &mut *on_progress);
                    }
                    return job.finish(status, start.elapsed());
                }
            }
        }
    }
}

/// Mutable per-run state.
#[derive(Debug, Default)]
struct JobState {
    tracker: ProgressTracker,
    analysis: Option<AnalysisResult>,
    tail: VecDeque<String>,
}

impl JobState {
    fn observe(&mut self, line: &str, log: bool, on_progress: ProgressCallback<'_>) {
        if line.trim().is_empty() {
            return;
        }
        if log {
            debug!(target: ENGINE_LOG_TARGET, "{}", line);
        }

        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());

        match parse_line(line) {
            Some(EngineEvent::Progress(update)) => {
                if let Some(update) = self.tracker.advance(update) {
                    on_progress(update);
                }
            }
            Some(EngineEvent::Fragment(fragment)) => {
                self.analysis.get_or_insert_with(Default::default).apply(fragment);
            }
            None => {}
        }
    }

    fn finish(
        self,
        status: ExitStatus,
        elapsed: Duration,
    ) -> Result<Option<AnalysisResult>, SliceError> {
        if status.success() {
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                has_analysis = self.analysis.is_some(),
                "Slicing engine completed"
            );
            return Ok(self.analysis);
        }

        let stderr_tail = Vec::from(self.tail).join("\n");
        error!(
            code = ?status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Slicing engine failed"
        );
        Err(SliceError::SliceEngineFailed {
            code: status.code(),
            stderr_tail,
        })
    }
}

/// Drain `buf` into a string, dropping the line terminator.
fn take_line(buf: &mut Vec<u8>) -> String {
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    line
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill slicing engine");
    }
}
