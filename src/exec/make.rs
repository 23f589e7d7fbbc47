// src/exec/make.rs

//! Build-tool adapter over [`ProcessRunner`].

use std::path::Path;

use crate::config::model::DEFAULT_BUILD_COMMAND;
use crate::errors::ProcessError;
use crate::exec::backend::{BoxFuture, BuildTool};
use crate::exec::runner::ProcessRunner;

#[derive(Debug)]
pub struct Make {
    runner: ProcessRunner,
}

impl Default for Make {
    fn default() -> Self {
        Self::new(DEFAULT_BUILD_COMMAND)
    }
}

impl Make {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            runner: ProcessRunner::new(command),
        }
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// `make clean`
    pub async fn clean<F>(&self, path: &Path, on_line: F) -> Result<i32, ProcessError>
    where
        F: FnMut(&str) + Send,
    {
        let code = self.runner.invoke(&["clean"], path, on_line).await?;
        self.check(code)
    }

    /// `make` with the default target.
    pub async fn build<F>(&self, path: &Path, on_line: F) -> Result<i32, ProcessError>
    where
        F: FnMut(&str) + Send,
    {
        let code = self.runner.invoke(&[], path, on_line).await?;
        self.check(code)
    }

    fn check(&self, code: i32) -> Result<i32, ProcessError> {
        if code == 0 {
            Ok(code)
        } else {
            Err(ProcessError::ExitStatus {
                program: self.runner.program().to_string(),
                code,
            })
        }
    }
}

impl BuildTool for Make {
    fn clean<'a>(
        &'a self,
        path: &'a Path,
        on_line: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<i32, ProcessError>> {
        Box::pin(Make::clean(self, path, on_line))
    }

    fn build<'a>(
        &'a self,
        path: &'a Path,
        on_line: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<i32, ProcessError>> {
        Box::pin(Make::build(self, path, on_line))
    }
}
