// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RebuilddError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RebuilddError>;

/// Failure modes of a single external process invocation.
///
/// Produced by [`crate::exec::ProcessRunner`] and the adapters built on it.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Already running: {program} (pid {pid:?})")]
    AlreadyRunning { program: String, pid: Option<u32> },

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// First chunk the child wrote to standard error, trimmed.
    #[error("{0}")]
    Stderr(String),

    #[error("`{program}` was stopped")]
    Stopped { program: String },

    #[error("`{program}` timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("`{program}` exited without printing anything")]
    NoOutput { program: String },

    #[error("`{program}` exited with code {code}")]
    ExitStatus { program: String, code: i32 },

    #[error("IO error while driving `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
