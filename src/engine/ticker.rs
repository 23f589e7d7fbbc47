// src/engine/ticker.rs

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::RuntimeEvent;

/// Send a [`RuntimeEvent::Tick`] every `period`, starting one period from now.
///
/// The task ends once the runtime stops receiving.
pub fn spawn_ticker(
    period: Duration,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs_f64(), "rebuild timer started");

        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticks.tick().await;
            if runtime_tx.send(RuntimeEvent::Tick).await.is_err() {
                debug!("runtime gone; rebuild timer stopping");
                break;
            }
        }
    })
}
