use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use rebuildd::errors::ProcessError;
use rebuildd::exec::{BoxFuture, BuildTool, Toolchain, VersionControl};
use rebuildd::project::program_name;

/// A fake toolchain that never spawns processes:
/// - `revision` answers from a per-program table
/// - `build` writes `<name>` and `<name>.o` into the source tree
/// - `clean` removes them again
/// - every build is counted per program
#[derive(Debug, Clone, Default)]
pub struct FakeToolchain {
    state: Arc<FakeState>,
}

#[derive(Debug)]
struct FakeState {
    revisions: Mutex<HashMap<String, String>>,
    failing_builds: Mutex<HashMap<String, String>>,
    failing_pulls: Mutex<HashSet<String>>,
    builds: Mutex<HashMap<String, usize>>,
    pulls: Mutex<HashMap<String, usize>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    pull_gate: Arc<Semaphore>,
    pull_armed: AtomicBool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            revisions: Mutex::default(),
            failing_builds: Mutex::default(),
            failing_pulls: Mutex::default(),
            builds: Mutex::default(),
            pulls: Mutex::default(),
            gate: Mutex::default(),
            pull_gate: Arc::new(Semaphore::new(0)),
            pull_armed: AtomicBool::new(false),
        }
    }
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `revision` for the program named `name`.
    pub fn set_revision(&self, name: &str, revision: &str) {
        self.state
            .revisions
            .lock()
            .unwrap()
            .insert(name.to_string(), revision.to_string());
    }

    /// Make `name` look like it is no longer under version control.
    pub fn clear_revision(&self, name: &str) {
        self.state.revisions.lock().unwrap().remove(name);
    }

    /// Make every build of `name` fail with `message` on stderr.
    pub fn fail_build(&self, name: &str, message: &str) {
        self.state
            .failing_builds
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
    }

    pub fn fail_pull(&self, name: &str) {
        self.state
            .failing_pulls
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn build_count(&self, name: &str) -> usize {
        self.state.builds.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn pull_count(&self, name: &str) -> usize {
        self.state.pulls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    /// Park every subsequent build until [`FakeToolchain::release_builds`].
    pub fn hold_builds(&self) {
        *self.state.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_builds(&self) {
        if let Some(gate) = self.state.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Park the next `pull` (of any program) until
    /// [`FakeToolchain::release_pull`]. Later pulls are not held.
    pub fn hold_next_pull(&self) {
        self.state.pull_armed.store(true, Ordering::SeqCst);
    }

    pub fn release_pull(&self) {
        self.state.pull_gate.add_permits(1);
    }
}

impl Toolchain for FakeToolchain {
    fn version_control(&self) -> Box<dyn VersionControl> {
        Box::new(FakeVcs {
            state: Arc::clone(&self.state),
        })
    }

    fn build_tool(&self) -> Box<dyn BuildTool> {
        Box::new(FakeMake {
            state: Arc::clone(&self.state),
        })
    }
}

struct FakeVcs {
    state: Arc<FakeState>,
}

impl VersionControl for FakeVcs {
    fn pull<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<i32, ProcessError>> {
        Box::pin(async move {
            let name = program_name(path);
            *self.state.pulls.lock().unwrap().entry(name.clone()).or_default() += 1;
            if self.state.pull_armed.swap(false, Ordering::SeqCst) {
                let _permit = self.state.pull_gate.acquire().await;
            }
            if self.state.failing_pulls.lock().unwrap().contains(&name) {
                return Err(ProcessError::Stderr("fatal: unable to access remote".into()));
            }
            Ok(0)
        })
    }

    fn revision<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<String, ProcessError>> {
        Box::pin(async move {
            let name = program_name(path);
            self.state
                .revisions
                .lock()
                .unwrap()
                .get(&name)
                .cloned()
                .ok_or_else(|| {
                    ProcessError::Stderr(
                        "fatal: not a git repository (or any of the parent directories): .git"
                            .into(),
                    )
                })
        })
    }
}

struct FakeMake {
    state: Arc<FakeState>,
}

impl BuildTool for FakeMake {
    fn clean<'a>(
        &'a self,
        path: &'a Path,
        on_line: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<i32, ProcessError>> {
        Box::pin(async move {
            let name = program_name(path);
            for file in [name.clone(), format!("{name}.o")] {
                let _ = std::fs::remove_file(path.join(file));
            }
            on_line(&format!("rm -f {name} {name}.o"));
            Ok(0)
        })
    }

    fn build<'a>(
        &'a self,
        path: &'a Path,
        on_line: &'a mut (dyn FnMut(&str) + Send),
    ) -> BoxFuture<'a, Result<i32, ProcessError>> {
        Box::pin(async move {
            let name = program_name(path);
            *self.state.builds.lock().unwrap().entry(name.clone()).or_default() += 1;

            let gate = self.state.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                let _permit = gate.acquire().await;
            }

            let failure = self.state.failing_builds.lock().unwrap().get(&name).cloned();
            if let Some(message) = failure {
                return Err(ProcessError::Stderr(message));
            }

            on_line(&format!("cc -c {name}.c -o {name}.o"));
            std::fs::write(path.join(format!("{name}.o")), b"object")
                .map_err(|source| ProcessError::Io { program: "make".into(), source })?;
            on_line(&format!("cc {name}.o -o {name}"));
            std::fs::write(path.join(&name), b"binary")
                .map_err(|source| ProcessError::Io { program: "make".into(), source })?;
            Ok(0)
        })
    }
}
