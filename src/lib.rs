// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod project;
pub mod registry;
pub mod transport;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::{resolve_settings, Settings};
use crate::engine::{spawn_ticker, Orchestrator, Runtime, RuntimeEvent};
use crate::exec::SystemToolchain;
use crate::registry::Registry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings (CLI + optional config file)
/// - storage directories and the registry
/// - orchestrator / runtime loop
/// - rebuild timer
/// - WebSocket transport
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;
    info!(?settings, "starting rebuildd");

    prepare_storage(&settings).await?;

    let mut registry = Registry::new(settings.registry_path());
    registry.setup(true);

    let hub = transport::hub();
    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        settings.artifacts_path(),
        SystemToolchain::from_settings(&settings),
        hub.clone(),
    ));
    let recovered = orchestrator.recover_interrupted().await;
    if recovered > 0 {
        info!(recovered, "recovered interrupted builds");
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let _ticker = spawn_ticker(settings.build_interval(), rt_tx.clone());

    {
        let addr = settings.listen_addr();
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = transport::serve(&addr, hub, tx.clone()).await {
                error!(error = ?e, "transport stopped");
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
            }
        });
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("shutting down");
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    drop(rt_tx);

    let runtime = Runtime::new(orchestrator, rt_rx);
    runtime.run().await?;
    Ok(())
}

/// Create the artifacts directory and the registry's parent directory.
///
/// Failing here is fatal: nothing useful can run without storage.
pub async fn prepare_storage(settings: &Settings) -> Result<()> {
    tokio::fs::create_dir_all(settings.artifacts_path())
        .await
        .with_context(|| {
            format!(
                "creating artifacts dir {}",
                settings.artifacts_path().display()
            )
        })?;

    if let Some(parent) = settings.registry_path().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating registry dir {}", parent.display()))?;
        }
    }

    Ok(())
}
