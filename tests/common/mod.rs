#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};

use rebuildd::engine::Orchestrator;
use rebuildd::registry::Registry;
use rebuildd::transport::{self, ServerEvent};
use rebuildd_test_utils::fake_toolchain::FakeToolchain;

pub use rebuildd_test_utils::{init_tracing, with_timeout};

/// Scratch layout shared by the orchestrator tests:
///
/// ```text
/// <tmp>/src/<program>/<program>.c
/// <tmp>/artifacts/
/// <tmp>/registry.json
/// ```
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn artifacts(&self) -> PathBuf {
        self.root().join("artifacts")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root().join("registry.json")
    }

    /// Create a source tree for `name` and return its location.
    pub fn add_program(&self, name: &str) -> PathBuf {
        let dir = self.root().join("src").join(name);
        std::fs::create_dir_all(&dir).expect("create program dir");
        std::fs::write(dir.join(format!("{name}.c")), "int main(void) { return 0; }\n")
            .expect("write source");
        dir
    }

    pub fn orchestrator(&self, toolchain: FakeToolchain) -> Arc<Orchestrator<FakeToolchain>> {
        let mut registry = Registry::new(self.registry_path());
        registry.setup(true);
        Arc::new(Orchestrator::new(
            registry,
            self.artifacts(),
            toolchain,
            transport::hub(),
        ))
    }
}

/// Everything currently queued on a reply channel.
pub fn drain_reply(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Everything currently queued on a hub subscription.
pub fn drain_hub(rx: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// The `msg` of every `build/output` event.
pub fn messages(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::BuildOutput { msg, .. } => Some(msg.clone()),
            _ => None,
        })
        .collect()
}
