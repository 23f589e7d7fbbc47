// src/exec/git.rs

//! Revision-control adapter over [`ProcessRunner`].

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::config::model::{DEFAULT_REVISION_TIMEOUT_SECS, DEFAULT_VCS_COMMAND};
use crate::errors::ProcessError;
use crate::exec::backend::{BoxFuture, VersionControl};
use crate::exec::runner::ProcessRunner;

#[derive(Debug)]
pub struct Git {
    runner: ProcessRunner,
    revision_timeout: Duration,
}

impl Default for Git {
    fn default() -> Self {
        Self::new(
            DEFAULT_VCS_COMMAND,
            Duration::from_secs(DEFAULT_REVISION_TIMEOUT_SECS),
        )
    }
}

impl Git {
    pub fn new(command: impl Into<String>, revision_timeout: Duration) -> Self {
        Self {
            runner: ProcessRunner::new(command),
            revision_timeout,
        }
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Fetch and integrate upstream changes; resolves with the exit code.
    pub async fn pull(&self, path: &Path) -> Result<i32, ProcessError> {
        self.runner
            .invoke(&["pull"], path, |line| {
                debug!(path = %path.display(), "git pull: {}", line)
            })
            .await
    }

    /// Short hash of `HEAD`: the first line `rev-parse` prints.
    pub async fn revision(&self, path: &Path) -> Result<String, ProcessError> {
        let mut first: Option<String> = None;
        let invocation = self.runner.invoke(&["rev-parse", "--short", "HEAD"], path, |line| {
            if first.is_none() {
                first = Some(line.to_string());
            }
        });

        let code = tokio::time::timeout(self.revision_timeout, invocation)
            .await
            .map_err(|_| ProcessError::Timeout {
                program: self.runner.program().to_string(),
                secs: self.revision_timeout.as_secs(),
            })??;

        if code != 0 {
            return Err(ProcessError::ExitStatus {
                program: self.runner.program().to_string(),
                code,
            });
        }

        first.ok_or_else(|| ProcessError::NoOutput {
            program: self.runner.program().to_string(),
        })
    }
}

impl VersionControl for Git {
    fn pull<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<i32, ProcessError>> {
        Box::pin(Git::pull(self, path))
    }

    fn revision<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, ProcessError>> {
        Box::pin(Git::revision(self, path))
    }
}
