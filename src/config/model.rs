// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_ARTIFACTS_PATH: &str = "artifacts";
pub const DEFAULT_REGISTRY_PATH: &str = "registry.json";
pub const DEFAULT_BUILD_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REVISION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VCS_COMMAND: &str = "git";
pub const DEFAULT_BUILD_COMMAND: &str = "make";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// host = "127.0.0.1"
/// port = 8090
///
/// [build]
/// artifacts_path = "/var/lib/rebuildd/artifacts"
/// registry_path = "/var/lib/rebuildd/registry.json"
/// interval_secs = 10
/// ```
///
/// Every key is optional; CLI flags take precedence over the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub build: BuildSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSection {
    #[serde(default)]
    pub artifacts_path: Option<String>,

    #[serde(default)]
    pub registry_path: Option<String>,

    /// Seconds between periodic reconciliation sweeps.
    #[serde(default)]
    pub interval_secs: Option<u64>,

    /// Upper bound on a single revision query.
    #[serde(default)]
    pub revision_timeout_secs: Option<u64>,

    /// Version-control executable (default `git`).
    #[serde(default)]
    pub vcs_command: Option<String>,

    /// Build-tool executable (default `make`).
    #[serde(default)]
    pub build_command: Option<String>,
}

/// Settings after CLI flags, file values and defaults have been layered,
/// but before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSettings {
    pub host: String,
    pub port: u16,
    pub artifacts_path: String,
    pub registry_path: String,
    pub interval_secs: u64,
    pub revision_timeout_secs: u64,
    pub vcs_command: String,
    pub build_command: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            artifacts_path: DEFAULT_ARTIFACTS_PATH.to_string(),
            registry_path: DEFAULT_REGISTRY_PATH.to_string(),
            interval_secs: DEFAULT_BUILD_INTERVAL_SECS,
            revision_timeout_secs: DEFAULT_REVISION_TIMEOUT_SECS,
            vcs_command: DEFAULT_VCS_COMMAND.to_string(),
            build_command: DEFAULT_BUILD_COMMAND.to_string(),
        }
    }
}

/// Validated runtime settings.
///
/// Only constructible through `TryFrom<RawSettings>` (see `validate.rs`),
/// so holders can rely on the invariants checked there.
#[derive(Debug, Clone)]
pub struct Settings {
    host: String,
    port: u16,
    artifacts_path: PathBuf,
    registry_path: PathBuf,
    build_interval: Duration,
    revision_timeout: Duration,
    vcs_command: String,
    build_command: String,
}

impl Settings {
    pub(crate) fn new_unchecked(raw: RawSettings) -> Self {
        Self {
            host: raw.host,
            port: raw.port,
            artifacts_path: PathBuf::from(raw.artifacts_path),
            registry_path: PathBuf::from(raw.registry_path),
            build_interval: Duration::from_secs(raw.interval_secs),
            revision_timeout: Duration::from_secs(raw.revision_timeout_secs),
            vcs_command: raw.vcs_command,
            build_command: raw.build_command,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn artifacts_path(&self) -> &PathBuf {
        &self.artifacts_path
    }

    pub fn registry_path(&self) -> &PathBuf {
        &self.registry_path
    }

    pub fn build_interval(&self) -> Duration {
        self.build_interval
    }

    pub fn revision_timeout(&self) -> Duration {
        self.revision_timeout
    }

    pub fn vcs_command(&self) -> &str {
        &self.vcs_command
    }

    pub fn build_command(&self) -> &str {
        &self.build_command
    }
}
