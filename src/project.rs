// src/project.rs

//! One tracked program: its source tree plus the tools that build it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::errors::ProcessError;
use crate::exec::{BuildTool, Git, Make, Toolchain, VersionControl};

/// Prefix attached to every build-tool line relayed to observers.
pub const BUILD_TOOL_TAG: &str = "build-tool: ";

pub struct Project {
    name: String,
    path: PathBuf,
    vcs: Box<dyn VersionControl>,
    build_tool: Box<dyn BuildTool>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Project at `path` using the default `git` / `make` executables.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_tools(path, Box::new(Git::default()), Box::new(Make::default()))
    }

    pub fn from_toolchain(path: impl Into<PathBuf>, toolchain: &dyn Toolchain) -> Self {
        Self::with_tools(path, toolchain.version_control(), toolchain.build_tool())
    }

    pub fn with_tools(
        path: impl Into<PathBuf>,
        vcs: Box<dyn VersionControl>,
        build_tool: Box<dyn BuildTool>,
    ) -> Self {
        let path = path.into();
        Self {
            name: program_name(&path),
            path,
            vcs,
            build_tool,
        }
    }

    /// Basename of the source location.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the source location currently resolves to a filesystem entry.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub async fn revision(&self) -> Result<String, ProcessError> {
        self.vcs.revision(&self.path).await
    }

    /// Pull upstream changes. Callers are expected to tolerate failure.
    pub async fn update(&self) -> Result<i32, ProcessError> {
        self.vcs.pull(&self.path).await
    }

    /// Clean, build, harvest artifacts into
    /// `artifacts_root/<name>/<revision>/`, clean again.
    ///
    /// Every build-tool line is relayed to `on_message` with
    /// [`BUILD_TOOL_TAG`]. The first failing step aborts the rest; artifacts
    /// already copied are kept. Returns the artifact directory.
    pub async fn build<F>(
        &self,
        revision: &str,
        artifacts_root: &Path,
        mut on_message: F,
    ) -> Result<PathBuf>
    where
        F: FnMut(String) + Send,
    {
        let mut relay = |line: &str| on_message(format!("{BUILD_TOOL_TAG}{line}"));

        info!(program = %self.name, revision, "building");

        // Leftovers from an interrupted attempt must not end up as artifacts.
        self.build_tool
            .clean(&self.path, &mut relay)
            .await
            .with_context(|| format!("cleaning {}", self.path.display()))?;

        self.build_tool
            .build(&self.path, &mut relay)
            .await
            .with_context(|| format!("building {}", self.name))?;

        let out_dir = artifacts_root.join(&self.name).join(revision);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .with_context(|| format!("creating artifact dir {}", out_dir.display()))?;

        let artifacts = self.collect_artifacts().await?;
        for src in &artifacts {
            let Some(file_name) = src.file_name() else {
                continue;
            };
            let dest = out_dir.join(file_name);
            tokio::fs::copy(src, &dest).await.with_context(|| {
                format!("copying artifact {} -> {}", src.display(), dest.display())
            })?;
            debug!(program = %self.name, artifact = %dest.display(), "artifact copied");
        }

        self.build_tool
            .clean(&self.path, &mut relay)
            .await
            .with_context(|| format!("cleaning {}", self.path.display()))?;

        info!(
            program = %self.name,
            revision,
            artifacts = artifacts.len(),
            dir = %out_dir.display(),
            "build finished"
        );

        Ok(out_dir)
    }

    /// Top-level entries of the source tree named exactly after the program,
    /// or with a `.o` / `.exe` suffix.
    async fn collect_artifacts(&self) -> Result<Vec<PathBuf>> {
        let pattern = artifact_pattern(&self.name)?;
        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .with_context(|| format!("reading dir {}", self.path.display()))?;

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("reading dir {}", self.path.display()))?
        {
            let file_name = entry.file_name();
            if !file_name.to_str().is_some_and(|n| pattern.is_match(n)) {
                continue;
            }
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            if !is_dir {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Logical program name: the basename of its location.
pub fn program_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `^<name>(\.o|\.exe)?$` with `name` matched literally.
pub fn artifact_pattern(name: &str) -> Result<Regex> {
    let pattern = format!(r"^{}(\.o|\.exe)?$", regex::escape(name));
    Regex::new(&pattern).with_context(|| format!("compiling artifact pattern for {name}"))
}
