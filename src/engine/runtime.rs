// src/engine/runtime.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::Toolchain;
use crate::transport::ServerEvent;

use super::{Orchestrator, RuntimeEvent};

/// Drives the orchestrator in response to `RuntimeEvent`s.
///
/// Registrations and sweeps run as their own Tokio tasks so a long build
/// never stalls event intake. At most one sweep runs at a time; a tick that
/// arrives while the previous sweep is still busy is dropped.
pub struct Runtime<T: Toolchain> {
    orchestrator: Arc<Orchestrator<T>>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    sweep: Option<JoinHandle<()>>,
    registrations: JoinSet<()>,
}

impl<T: Toolchain> std::fmt::Debug for Runtime<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("orchestrator", &self.orchestrator)
            .field("registrations", &self.registrations.len())
            .finish_non_exhaustive()
    }
}

impl<T: Toolchain> Runtime<T> {
    pub fn new(orchestrator: Arc<Orchestrator<T>>, event_rx: mpsc::Receiver<RuntimeEvent>) -> Self {
        Self {
            orchestrator,
            event_rx,
            sweep: None,
            registrations: JoinSet::new(),
        }
    }

    /// Main event loop.
    ///
    /// Returns when shutdown is requested or every sender is gone. The
    /// registry is flushed on the way out; in-flight work is abandoned and
    /// its `building` records are recovered on next start.
    pub async fn run(mut self) -> Result<()> {
        info!("rebuildd runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::Connected { reply } => {
                    let snapshot = self.orchestrator.snapshot();
                    if reply.send(ServerEvent::ProgramsRegistered(snapshot)).is_err() {
                        debug!("observer left before receiving snapshot");
                    }
                }
                RuntimeEvent::RegisterRequested { location, reply } => {
                    let orchestrator = Arc::clone(&self.orchestrator);
                    self.registrations.spawn(async move {
                        let outcome = orchestrator.register(&location, &reply).await;
                        debug!(%location, ?outcome, "registration finished");
                    });
                }
                RuntimeEvent::Tick => self.start_sweep(),
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested");
                    break;
                }
            }

            // Reap finished registrations so the set does not grow unbounded.
            while let Some(done) = self.registrations.try_join_next() {
                if let Err(e) = done {
                    warn!(error = %e, "registration task failed");
                }
            }
        }

        self.orchestrator.persist().await;
        info!("runtime exiting");
        Ok(())
    }

    fn start_sweep(&mut self) {
        if let Some(sweep) = &self.sweep {
            if !sweep.is_finished() {
                debug!("previous sweep still running; skipping tick");
                return;
            }
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        self.sweep = Some(tokio::spawn(async move {
            orchestrator.reconcile_all().await;
        }));
    }
}
