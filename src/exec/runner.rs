// src/exec/runner.rs

//! Single-flight wrapper around one external executable.
//!
//! A [`ProcessRunner`] owns a fixed program name and runs at most one child
//! process at a time. Standard output is streamed line by line to a callback
//! while the invocation is in flight; the invocation itself resolves with the
//! exit code once stdout has closed and the child has exited.
//!
//! Any data on standard error, or a spawn failure, kills the child and turns
//! the invocation into an error carrying that content.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::ProcessError;

const STDERR_CHUNK: usize = 4096;

/// How long to wait for stderr written just before exit. A background
/// grandchild may keep the pipe open indefinitely.
const LATE_STDERR_WAIT: Duration = Duration::from_millis(100);

/// Explicit lifecycle of a runner.
#[derive(Debug)]
enum RunnerState {
    Idle,
    Running {
        /// Bumped per invocation so a finished invocation never clears the
        /// state of a newer one.
        generation: u64,
        pid: Option<u32>,
        kill: Option<oneshot::Sender<()>>,
    },
}

#[derive(Debug)]
struct Inner {
    state: RunnerState,
    next_generation: u64,
}

/// Runs one external program, one invocation at a time.
///
/// Callers needing concurrent invocations must use distinct instances.
#[derive(Debug)]
pub struct ProcessRunner {
    program: String,
    inner: Mutex<Inner>,
}

/// Resets the runner to `Idle` when an invocation ends, including when the
/// invocation future is dropped (e.g. by a timeout).
struct InFlight<'a> {
    runner: &'a ProcessRunner,
    generation: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.runner.lock();
        if let RunnerState::Running { generation, .. } = inner.state {
            if generation == self.generation {
                inner.state = RunnerState::Idle;
            }
        }
    }
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            inner: Mutex::new(Inner {
                state: RunnerState::Idle,
                next_generation: 0,
            }),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lock().state, RunnerState::Running { .. })
    }

    /// Spawn the program with `args` in `cwd` and wait for it to finish.
    ///
    /// Every non-empty stdout line is passed to `on_line` (trailing
    /// whitespace trimmed) as it arrives. Resolves with the exit code, or
    /// `-1` when the child was terminated by a signal.
    pub async fn invoke<F>(
        &self,
        args: &[&str],
        cwd: &Path,
        mut on_line: F,
    ) -> Result<i32, ProcessError>
    where
        F: FnMut(&str) + Send,
    {
        let (guard, kill_rx) = self.begin()?;

        debug!(program = %self.program, ?args, cwd = %cwd.display(), "spawning process");

        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        self.record_pid(guard.generation, child.id());

        let result = self.drive(&mut child, kill_rx, &mut on_line).await;
        drop(guard);
        result
    }

    /// Kill the in-flight child, if any.
    ///
    /// Returns `false` when nothing was running; idempotent. The runner is
    /// free again as soon as the kill is signalled, so a following `invoke`
    /// may spawn while the old child is still being reaped by its own
    /// invocation.
    pub fn stop(&self) -> bool {
        let previous = std::mem::replace(&mut self.lock().state, RunnerState::Idle);
        match previous {
            RunnerState::Idle => false,
            RunnerState::Running { pid, kill, .. } => {
                info!(program = %self.program, ?pid, "stopping process");
                if let Some(kill) = kill {
                    // The receiver is gone only if the invocation already ended.
                    let _ = kill.send(());
                }
                true
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> Result<(InFlight<'_>, oneshot::Receiver<()>), ProcessError> {
        let mut inner = self.lock();
        if let RunnerState::Running { pid, .. } = inner.state {
            return Err(ProcessError::AlreadyRunning {
                program: self.program.clone(),
                pid,
            });
        }

        let generation = inner.next_generation;
        inner.next_generation = inner.next_generation.wrapping_add(1);

        let (kill_tx, kill_rx) = oneshot::channel();
        inner.state = RunnerState::Running {
            generation,
            pid: None,
            kill: Some(kill_tx),
        };

        Ok((
            InFlight {
                runner: self,
                generation,
            },
            kill_rx,
        ))
    }

    fn record_pid(&self, current: u64, child_pid: Option<u32>) {
        let mut inner = self.lock();
        if let RunnerState::Running {
            generation, pid, ..
        } = &mut inner.state
        {
            if *generation == current {
                *pid = child_pid;
            }
        }
    }

    async fn drive(
        &self,
        child: &mut Child,
        mut kill_rx: oneshot::Receiver<()>,
        on_line: &mut (dyn FnMut(&str) + Send),
    ) -> Result<i32, ProcessError> {
        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut stderr = child.stderr.take();
        let mut stdout_open = stdout.is_some();
        let mut stderr_open = stderr.is_some();
        let mut buf = vec![0u8; STDERR_CHUNK];

        loop {
            tokio::select! {
                biased;

                _ = &mut kill_rx => {
                    self.kill(child).await;
                    return Err(ProcessError::Stopped { program: self.program.clone() });
                }

                read = read_chunk(&mut stderr, &mut buf), if stderr_open => {
                    match read {
                        Ok(0) | Err(_) => stderr_open = false,
                        Ok(n) => return Err(self.reject_stderr(child, &buf[..n]).await),
                    }
                }

                line = next_line(&mut stdout), if stdout_open => {
                    match line {
                        Ok(Some(line)) => {
                            let line = line.trim_end();
                            if !line.is_empty() {
                                on_line(line);
                            }
                        }
                        Ok(None) => stdout_open = false,
                        Err(source) => {
                            self.kill(child).await;
                            return Err(ProcessError::Io { program: self.program.clone(), source });
                        }
                    }
                }

                status = child.wait(), if !stdout_open => {
                    let status = status.map_err(|source| ProcessError::Io {
                        program: self.program.clone(),
                        source,
                    })?;

                    // Late stderr still rejects.
                    if stderr_open {
                        let late = tokio::time::timeout(
                            LATE_STDERR_WAIT,
                            read_chunk(&mut stderr, &mut buf),
                        )
                        .await;
                        if let Ok(Ok(n)) = late {
                            if n > 0 {
                                let text = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();
                                return Err(ProcessError::Stderr(text));
                            }
                        }
                    }

                    let code = status.code().unwrap_or(-1);
                    debug!(program = %self.program, exit_code = code, "process exited");
                    return Ok(code);
                }
            }
        }
    }

    async fn reject_stderr(&self, child: &mut Child, chunk: &[u8]) -> ProcessError {
        let text = String::from_utf8_lossy(chunk).trim_end().to_string();
        debug!(program = %self.program, stderr = %text, "stderr output; killing process");
        self.kill(child).await;
        ProcessError::Stderr(text)
    }

    async fn kill(&self, child: &mut Child) {
        if let Err(e) = child.kill().await {
            warn!(program = %self.program, error = %e, "failed to kill child process");
        }
    }
}

async fn next_line(
    lines: &mut Option<Lines<BufReader<ChildStdout>>>,
) -> std::io::Result<Option<String>> {
    match lines {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}

async fn read_chunk(stderr: &mut Option<ChildStderr>, buf: &mut [u8]) -> std::io::Result<usize> {
    match stderr {
        Some(stderr) => stderr.read(buf).await,
        None => Ok(0),
    }
}
