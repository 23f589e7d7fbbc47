// src/engine/orchestrator.rs

//! Build orchestration: registration and periodic reconciliation.
//!
//! The orchestrator owns the [`Registry`] behind a lock. Every check-then-act
//! on it (dedup + transition to `building`, the in-flight skip, removal)
//! happens inside a single lock section, so registration tasks and sweep
//! tasks can run in parallel without duplicating or losing builds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::engine::{ReconcileOutcome, RegisterOutcome};
use crate::exec::Toolchain;
use crate::project::Project;
use crate::registry::{store, BuildStatus, Claim, ProgramRecord, Registry};
use crate::transport::{Hub, Reply, ServerEvent};

pub struct Orchestrator<T: Toolchain> {
    registry: Mutex<Registry>,
    artifacts_root: PathBuf,
    toolchain: T,
    hub: Hub,
    persist_lock: tokio::sync::Mutex<()>,
}

impl<T: Toolchain> std::fmt::Debug for Orchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("artifacts_root", &self.artifacts_root)
            .finish_non_exhaustive()
    }
}

impl<T: Toolchain> Orchestrator<T> {
    pub fn new(registry: Registry, artifacts_root: impl Into<PathBuf>, toolchain: T, hub: Hub) -> Self {
        Self {
            registry: Mutex::new(registry),
            artifacts_root: artifacts_root.into(),
            toolchain,
            hub,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn artifacts_root(&self) -> &Path {
        &self.artifacts_root
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Current records, for a newly connected observer.
    pub fn snapshot(&self) -> Vec<ProgramRecord> {
        self.registry().programs()
    }

    pub fn get_program(&self, name: &str, revision: &str) -> Option<ProgramRecord> {
        self.registry().get_program(name, revision).cloned()
    }

    /// Mark builds left `building` by a previous process as `failed`.
    ///
    /// Nothing can still be running for them, and a stale `building` record
    /// would otherwise make every sweep skip the program.
    pub async fn recover_interrupted(&self) -> usize {
        let recovered: Vec<ProgramRecord> = {
            let mut registry = self.registry();
            let stale: Vec<ProgramRecord> = registry
                .programs()
                .into_iter()
                .filter(|r| r.status == BuildStatus::Building)
                .collect();
            stale
                .iter()
                .map(|r| registry.update(&r.name, &r.revision, BuildStatus::Failed, None))
                .collect()
        };

        for record in &recovered {
            warn!(program = %record.name, revision = %record.revision, "interrupted build marked failed");
        }
        if !recovered.is_empty() {
            self.persist().await;
        }
        recovered.len()
    }

    /// Handle one registration request for `location`.
    ///
    /// Progress lines go to `reply` only; record changes are broadcast.
    pub async fn register(&self, location: &str, reply: &Reply) -> RegisterOutcome {
        let project = Project::from_toolchain(location, &self.toolchain);
        let name = project.name().to_string();
        let say = |msg: String| {
            // The requester may have disconnected; the build carries on.
            let _ = reply.send(ServerEvent::BuildOutput {
                program: name.clone(),
                msg,
            });
        };

        // A location without a basename ("/", "..") cannot name a program.
        if name.is_empty() || !project.exists() {
            info!(location, "registration for missing location");
            say(format!("no program found at {location}"));
            return RegisterOutcome::NotFound;
        }

        if let Err(e) = project.update().await {
            warn!(program = %name, error = %e, "pull failed; building current checkout");
            say(format!("git pull: {e}"));
        }

        let revision = match project.revision().await {
            Ok(rev) => rev,
            Err(e) => {
                warn!(program = %name, error = %e, "revision query failed");
                say(format!("failed to get revision: {e}"));
                return RegisterOutcome::RevisionUnavailable;
            }
        };

        let claimed = self.registry().claim(&name, &revision, project.path());
        let record = match claimed {
            Claim::Claimed(record) => record,
            Claim::Known(existing) => {
                info!(program = %name, %revision, "already registered");
                say(format!("{name} at revision {revision} is already registered"));
                return RegisterOutcome::AlreadyRegistered(existing);
            }
            Claim::Busy(building) => {
                info!(program = %name, %revision, building = %building.revision, "build in flight");
                say(format!(
                    "{name} is already building revision {}",
                    building.revision
                ));
                return RegisterOutcome::Busy(building);
            }
        };

        self.persist().await;
        self.publish(ServerEvent::RegistryUpdate(record));

        let record = self.run_build(&project, &revision, say).await;
        self.persist().await;
        self.publish(ServerEvent::RegistryUpdate(record.clone()));

        match record.status {
            BuildStatus::Completed => RegisterOutcome::Completed(record),
            _ => RegisterOutcome::Failed(record),
        }
    }

    /// One periodic sweep over every tracked program.
    ///
    /// Distinct programs are reconciled in parallel; records sharing a name
    /// are handled one location at a time. The registry is persisted once
    /// after all of them settle.
    pub async fn reconcile_all(self: &Arc<Self>) -> Vec<ReconcileOutcome> {
        let units = group_units(&self.snapshot());
        debug!(programs = units.len(), "reconciliation sweep started");

        let mut tasks = JoinSet::new();
        for (name, by_location) in units {
            let this = Arc::clone(self);
            tasks.spawn(async move {
                let mut outcomes = Vec::with_capacity(by_location.len());
                for (location, records) in by_location {
                    outcomes.push(this.reconcile_unit(&name, &location, records).await);
                }
                outcomes
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(mut unit_outcomes) => outcomes.append(&mut unit_outcomes),
                Err(e) => error!(error = %e, "reconciliation task panicked"),
            }
        }

        self.persist().await;
        debug!(units = outcomes.len(), "reconciliation sweep finished");
        outcomes
    }

    /// Reconcile the records of `name` last seen at `location`.
    async fn reconcile_unit(
        &self,
        name: &str,
        location: &Path,
        records: Vec<ProgramRecord>,
    ) -> ReconcileOutcome {
        let project = Project::from_toolchain(location, &self.toolchain);

        if project.name() != name || !project.exists() {
            info!(program = name, location = %location.display(), "source gone; pruning");
            return ReconcileOutcome::Pruned(self.prune(records).await);
        }

        if self.registry().is_building(name) {
            debug!(program = name, "build in flight; skipping");
            return ReconcileOutcome::Skipped;
        }

        if let Err(e) = project.update().await {
            debug!(program = name, error = %e, "pull failed; comparing current checkout");
        }

        let revision = match project.revision().await {
            Ok(rev) => rev,
            Err(e) => {
                info!(program = name, error = %e, "no longer under version control; pruning");
                return ReconcileOutcome::Pruned(self.prune(records).await);
            }
        };

        // Re-checked under the lock: a registration may have started a build
        // while this unit was pulling.
        let record = match self.registry().claim(name, &revision, location) {
            Claim::Claimed(record) => record,
            Claim::Known(_) => return ReconcileOutcome::UpToDate,
            Claim::Busy(_) => {
                debug!(program = name, "build started meanwhile; skipping");
                return ReconcileOutcome::Skipped;
            }
        };

        info!(program = name, %revision, "new revision detected");
        self.publish(ServerEvent::RegistryUpdate(record));
        let record = self.run_build(&project, &revision, |_| {}).await;
        self.publish(ServerEvent::RegistryUpdate(record.clone()));
        ReconcileOutcome::Built(record)
    }

    /// Build `revision` and record the terminal status.
    async fn run_build<F>(&self, project: &Project, revision: &str, mut on_message: F) -> ProgramRecord
    where
        F: FnMut(String) + Send,
    {
        let status = match project
            .build(revision, &self.artifacts_root, &mut on_message)
            .await
        {
            Ok(_) => BuildStatus::Completed,
            Err(e) => {
                let msg = format!("{e:#}");
                error!(program = %project.name(), revision, error = %msg, "build failed");
                on_message(msg);
                BuildStatus::Failed
            }
        };

        self.registry()
            .update(project.name(), revision, status, None)
    }

    /// Drop `records` and their artifact directories, then tell observers.
    async fn prune(&self, records: Vec<ProgramRecord>) -> Vec<ProgramRecord> {
        let mut removed = Vec::with_capacity(records.len());
        for record in records {
            let Some(record) = self.registry().remove(&record.name, &record.revision) else {
                continue;
            };

            let dir = record.artifact_dir(&self.artifacts_root);
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(dir = %dir.display(), "artifacts removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove artifacts"),
            }
            if let Some(program_dir) = dir.parent() {
                // Only succeeds once the last revision is gone.
                let _ = tokio::fs::remove_dir(program_dir).await;
            }

            self.publish(ServerEvent::RegistryRemove {
                id: record.id.clone(),
            });
            removed.push(record);
        }
        removed
    }

    /// Flush the registry; failures are logged, never propagated.
    pub async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let (path, records) = {
            let registry = self.registry();
            (registry.path().to_path_buf(), registry.clone_map())
        };

        match tokio::task::spawn_blocking(move || store::save(&path, &records)).await {
            Ok(Ok(())) => debug!("registry saved"),
            Ok(Err(e)) => error!(error = ?e, "failed to save registry"),
            Err(e) => error!(error = %e, "registry save task failed"),
        }
    }

    fn publish(&self, event: ServerEvent) {
        // No observers connected is not an error.
        let _ = self.hub.send(event);
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// name -> location -> records.
fn group_units(records: &[ProgramRecord]) -> BTreeMap<String, BTreeMap<PathBuf, Vec<ProgramRecord>>> {
    let mut units: BTreeMap<String, BTreeMap<PathBuf, Vec<ProgramRecord>>> = BTreeMap::new();
    for record in records {
        let location = record.location.clone().unwrap_or_default();
        units
            .entry(record.name.clone())
            .or_default()
            .entry(location)
            .or_default()
            .push(record.clone());
    }
    units
}
