//! Solver process execution with a hard wall-clock deadline.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DispatchError, DispatchResult};
use crate::invocation::SolverInvocation;

/// How long the output readers may keep draining past the deadline.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Outcome of one solver process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited {
        /// Exit code (`-1` when terminated by a signal).
        code: i32,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    },
    TimedOut {
        stdout: String,
        stderr: String,
        duration_ms: u64,
    },
}

impl ProcessOutcome {
    pub fn timed_out(&self) -> bool {
        matches!(self, ProcessOutcome::TimedOut { .. })
    }
}

/// Drain `pipe` until EOF or `stop_at`, whichever comes first. Output read
/// before `stop_at` is kept.
fn spawn_reader<R>(pipe: Option<R>, stop_at: tokio::time::Instant) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let mut chunk = [0u8; 8192];
            loop {
                match tokio::time::timeout_at(stop_at, pipe.read(&mut chunk)).await {
                    Ok(Ok(0)) | Ok(Err(_)) => break,
                    Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                    Err(_) => {
                        debug!("output pipe still open at drain deadline");
                        break;
                    }
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

/// Run `invocation` to completion or until `timeout` elapses.
///
/// Stdout and stderr are drained concurrently, for at most `timeout` plus
/// a short grace period in total, even when a grandchild keeps the pipes
/// open after the solver exits. On expiry the child is killed and reaped
/// before returning [`ProcessOutcome::TimedOut`]. A failure to spawn is
/// returned as an error.
pub async fn run_with_deadline(
    invocation: &SolverInvocation,
    timeout: Duration,
) -> DispatchResult<ProcessOutcome> {
    let start = Instant::now();

    let (exe, args) = invocation
        .command
        .split_first()
        .ok_or_else(|| DispatchError::EmptyCommand(invocation.test_case.clone()))?;

    let mut command = Command::new(exe);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    let mut child = command.spawn().map_err(|source| DispatchError::Spawn {
        program: exe.clone(),
        source,
    })?;
    debug!(
        test_case = %invocation.test_case,
        variant = %invocation.variant,
        pid = ?child.id(),
        "solver spawned"
    );

    let drain_deadline = tokio::time::Instant::from_std(start) + timeout + DRAIN_GRACE;
    let stdout = spawn_reader(child.stdout.take(), drain_deadline);
    let stderr = spawn_reader(child.stderr.take(), drain_deadline);

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = stdout.await.unwrap_or_default();
            let stderr = stderr.await.unwrap_or_default();
            Ok(ProcessOutcome::Exited {
                code: status.code().unwrap_or(-1),
                stdout,
                stderr,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Err(_) => {
            warn!(
                test_case = %invocation.test_case,
                variant = %invocation.variant,
                timeout_secs = timeout.as_secs_f64(),
                "solver exceeded deadline, killing"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill timed-out solver");
            }
            let stdout = stdout.await.unwrap_or_default();
            let stderr = stderr.await.unwrap_or_default();
            Ok(ProcessOutcome::TimedOut {
                stdout,
                stderr,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Executes one solver invocation. Injected into the dispatcher so tests
/// can substitute a deterministic stub.
#[async_trait]
pub trait TrialExecutor: Send + Sync + 'static {
    async fn execute(
        &self,
        invocation: &SolverInvocation,
        timeout: Duration,
    ) -> DispatchResult<ProcessOutcome>;
}

/// Production executor backed by [`run_with_deadline`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

#[async_trait]
impl TrialExecutor for ProcessExecutor {
    async fn execute(
        &self,
        invocation: &SolverInvocation,
        timeout: Duration,
    ) -> DispatchResult<ProcessOutcome> {
        run_with_deadline(invocation, timeout).await
    }
}
