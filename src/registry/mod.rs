// src/registry/mod.rs

//! Durable store of every `(program, revision)` build record.
//!
//! The registry is a plain owned value; the orchestrator wraps it in a lock
//! and routes every mutation through the methods below.

pub mod record;
pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

pub use record::{BuildStatus, ProgramKey, ProgramRecord};

/// Result of [`Registry::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The pair was inserted as `building`; the caller owns the build.
    Claimed(ProgramRecord),
    /// The pair already has a record.
    Known(ProgramRecord),
    /// Another revision of the same program is building.
    Busy(ProgramRecord),
}

#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
    records: BTreeMap<ProgramKey, ProgramRecord>,
}

impl Registry {
    /// Empty registry backed by the document at `path`. Call
    /// [`Registry::setup`] to load existing state.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the backing document when `read_existing` is set.
    ///
    /// A missing or corrupt document leaves the registry empty.
    pub fn setup(&mut self, read_existing: bool) {
        if !read_existing {
            return;
        }
        match store::load(&self.path) {
            Some(records) => {
                info!(path = %self.path.display(), count = records.len(), "registry loaded");
                self.records = records;
            }
            None => {
                debug!(path = %self.path.display(), "no usable registry document; starting empty");
                self.records.clear();
            }
        }
    }

    /// Upsert the record for `(name, revision)`.
    ///
    /// An existing record keeps its location unless a non-empty `location`
    /// is supplied.
    pub fn update(
        &mut self,
        name: &str,
        revision: &str,
        status: BuildStatus,
        location: Option<&Path>,
    ) -> ProgramRecord {
        let location = location
            .filter(|l| !l.as_os_str().is_empty())
            .map(Path::to_path_buf);
        let key = ProgramKey::new(name, revision);

        let record = self
            .records
            .entry(key)
            .and_modify(|record| {
                record.status = status;
                if let Some(loc) = &location {
                    record.location = Some(loc.clone());
                }
            })
            .or_insert_with(|| ProgramRecord::new(name, revision, status, location.clone()));

        record.clone()
    }

    /// Insert `(name, revision)` as `building` unless the pair is already
    /// known or another revision of `name` is still building.
    ///
    /// Refusals leave the registry untouched.
    pub fn claim(&mut self, name: &str, revision: &str, location: &Path) -> Claim {
        if let Some(existing) = self.records.get(&ProgramKey::new(name, revision)) {
            return Claim::Known(existing.clone());
        }
        if let Some(building) = self
            .records
            .values()
            .find(|r| r.name == name && r.status == BuildStatus::Building)
        {
            return Claim::Busy(building.clone());
        }
        Claim::Claimed(self.update(name, revision, BuildStatus::Building, Some(location)))
    }

    pub fn get_program(&self, name: &str, revision: &str) -> Option<&ProgramRecord> {
        self.records.get(&ProgramKey::new(name, revision))
    }

    /// Remove the record for `(name, revision)`; a no-op when absent.
    pub fn remove(&mut self, name: &str, revision: &str) -> Option<ProgramRecord> {
        self.records.remove(&ProgramKey::new(name, revision))
    }

    /// Snapshot of every record, ordered by name then revision.
    pub fn programs(&self) -> Vec<ProgramRecord> {
        self.records.values().cloned().collect()
    }

    /// Copy of the whole map; mutating it never affects the registry.
    pub fn clone_map(&self) -> BTreeMap<ProgramKey, ProgramRecord> {
        self.records.clone()
    }

    /// Every record tracked under `name`.
    pub fn records_for(&self, name: &str) -> Vec<ProgramRecord> {
        self.records
            .values()
            .filter(|r| r.name == name)
            .cloned()
            .collect()
    }

    /// Whether any record of `name` has a build in flight.
    pub fn is_building(&self, name: &str) -> bool {
        self.records
            .values()
            .any(|r| r.name == name && r.status == BuildStatus::Building)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the full map to the backing document (write-then-rename).
    pub fn save(&self) -> Result<()> {
        store::save(&self.path, &self.records)
    }
}
