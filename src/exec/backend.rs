// src/exec/backend.rs

//! Pluggable toolchain abstraction.
//!
//! A [`crate::project::Project`] talks to a [`VersionControl`] and a
//! [`BuildTool`] rather than to `git`/`make` directly, and the orchestrator
//! obtains fresh instances of both from a [`Toolchain`] for every project it
//! builds. Production code uses [`SystemToolchain`]; tests can provide fakes
//! that never spawn real processes.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use crate::config::Settings;
use crate::config::model::{
    DEFAULT_BUILD_COMMAND, DEFAULT_REVISION_TIMEOUT_SECS, DEFAULT_VCS_COMMAND,
};
use crate::errors::ProcessError;
use crate::exec::git::Git;
use crate::exec::make::Make;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// "Fetch via version control" half of a project.
pub trait VersionControl: Send + Sync {
    /// Fetch and integrate upstream changes. Resolves with the exit code.
    fn pull<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<i32, ProcessError>>;

    /// Opaque identifier of the checked-out revision.
    fn revision<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, ProcessError>>;
}

/// "Build via a declarative build tool" half of a project.
pub trait BuildTool: Send + Sync {
    fn clean<'a>(
        &'a self,
        path: &'a Path,
        on_line: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<i32, ProcessError>>;

    fn build<'a>(
        &'a self,
        path: &'a Path,
        on_line: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<i32, ProcessError>>;
}

/// Factory for per-project adapters.
///
/// Every project gets its own instances, so two projects never contend for
/// the same single-flight runner.
pub trait Toolchain: Send + Sync + 'static {
    fn version_control(&self) -> Box<dyn VersionControl>;
    fn build_tool(&self) -> Box<dyn BuildTool>;
}

/// Real toolchain: external `git` and `make` executables.
#[derive(Debug, Clone)]
pub struct SystemToolchain {
    vcs_command: String,
    build_command: String,
    revision_timeout: Duration,
}

impl Default for SystemToolchain {
    fn default() -> Self {
        Self {
            vcs_command: DEFAULT_VCS_COMMAND.to_string(),
            build_command: DEFAULT_BUILD_COMMAND.to_string(),
            revision_timeout: Duration::from_secs(DEFAULT_REVISION_TIMEOUT_SECS),
        }
    }
}

impl SystemToolchain {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            vcs_command: settings.vcs_command().to_string(),
            build_command: settings.build_command().to_string(),
            revision_timeout: settings.revision_timeout(),
        }
    }
}

impl Toolchain for SystemToolchain {
    fn version_control(&self) -> Box<dyn VersionControl> {
        Box::new(Git::new(self.vcs_command.clone(), self.revision_timeout))
    }

    fn build_tool(&self) -> Box<dyn BuildTool> {
        Box::new(Make::new(self.build_command.clone()))
    }
}
