// src/logging.rs

//! Daemon logging.
//!
//! The level comes from `--log-level`, else `REBUILDD_LOG`, else `info`, and
//! applies to rebuildd's own events. The HTTP stack underneath the WebSocket
//! server (`axum`, `hyper`, `tower`) is never louder than `warn`, so
//! per-connection chatter does not bury build progress. Output goes to stderr.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "REBUILDD_LOG";

const TRANSPORT_CRATES: [&str; 3] = ["axum", "hyper", "tower"];

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = cli_level
        .map(level_from_log_level)
        .or_else(|| std::env::var(LOG_ENV).ok().and_then(|s| parse_level_str(&s)))
        .unwrap_or(Level::INFO);

    fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

/// Directives for `level`, with the transport crates capped at `warn`.
pub fn filter_for(level: Level) -> EnvFilter {
    let transport = std::cmp::min(level, Level::WARN);
    let mut directives = level.as_str().to_ascii_lowercase();
    for krate in TRANSPORT_CRATES {
        directives.push_str(&format!(",{krate}={}", transport.as_str().to_ascii_lowercase()));
    }
    EnvFilter::new(directives)
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
