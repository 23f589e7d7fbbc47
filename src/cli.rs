// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `rebuildd`.
///
/// Every setting is optional here; unset flags fall back to the config file
/// (if given) and then to built-in defaults. See [`crate::config`].
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "rebuildd",
    version,
    about = "Track git-hosted C programs and rebuild them whenever upstream changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Optional TOML config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Directory where build artifacts are stored.
    #[arg(short = 'a', long, value_name = "PATH")]
    pub artifacts_path: Option<String>,

    /// JSON document holding the program registry.
    #[arg(short = 'r', long, value_name = "PATH")]
    pub registry_path: Option<String>,

    /// Seconds between automatic rebuild sweeps of registered programs.
    #[arg(short = 'b', long, value_name = "SECS")]
    pub build_interval: Option<u64>,

    /// Seconds to wait for `git rev-parse` before giving up.
    #[arg(long, value_name = "SECS")]
    pub revision_timeout: Option<u64>,

    /// Interface for the WebSocket server.
    #[arg(long, value_name = "ADDR")]
    pub host: Option<String>,

    /// Network port for the WebSocket server.
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REBUILDD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
