// src/registry/record.rs

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Build status of one `(program, revision)` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Building,
    Completed,
    Failed,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Building => "building",
            BuildStatus::Completed => "completed",
            BuildStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Composite registry key.
///
/// Kept as a pair rather than a formatted string so that names containing
/// the display separator can never collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramKey {
    pub name: String,
    pub revision: String,
}

impl ProgramKey {
    pub fn new(name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: revision.into(),
        }
    }

    /// Wire/document identifier, `"<name>/<revision>"`.
    ///
    /// Program names are path basenames and never contain `/`, so the id
    /// splits back unambiguously.
    pub fn id(&self) -> String {
        format!("{}/{}", self.name, self.revision)
    }
}

impl fmt::Display for ProgramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.revision)
    }
}

/// One build attempt of one tracked program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub id: String,
    pub name: String,
    pub revision: String,
    pub status: BuildStatus,
    #[serde(default)]
    pub location: Option<PathBuf>,
}

impl ProgramRecord {
    pub fn new(
        name: impl Into<String>,
        revision: impl Into<String>,
        status: BuildStatus,
        location: Option<PathBuf>,
    ) -> Self {
        let key = ProgramKey::new(name, revision);
        Self {
            id: key.id(),
            name: key.name,
            revision: key.revision,
            status,
            location,
        }
    }

    pub fn key(&self) -> ProgramKey {
        ProgramKey::new(self.name.clone(), self.revision.clone())
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Directory holding this record's artifacts under `artifacts_root`.
    pub fn artifact_dir(&self, artifacts_root: &Path) -> PathBuf {
        artifacts_root.join(&self.name).join(&self.revision)
    }
}
