// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::cli::CliArgs;
use crate::config::model::{RawConfigFile, RawSettings, Settings};
use crate::errors::Result;

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; values are validated once they
/// have been merged with the CLI flags in [`resolve_settings`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Resolve the effective settings for this process.
///
/// Precedence per key: CLI flag, then `--config` file, then built-in default.
pub fn resolve_settings(args: &CliArgs) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawConfigFile::default(),
    };
    Settings::try_from(merge(args, file))
}

/// Layer CLI flags over file values over defaults.
pub fn merge(args: &CliArgs, file: RawConfigFile) -> RawSettings {
    let defaults = RawSettings::default();
    let RawConfigFile { server, build } = file;

    RawSettings {
        host: args.host.clone().or(server.host).unwrap_or(defaults.host),
        port: args.port.or(server.port).unwrap_or(defaults.port),
        artifacts_path: args
            .artifacts_path
            .clone()
            .or(build.artifacts_path)
            .unwrap_or(defaults.artifacts_path),
        registry_path: args
            .registry_path
            .clone()
            .or(build.registry_path)
            .unwrap_or(defaults.registry_path),
        interval_secs: args
            .build_interval
            .or(build.interval_secs)
            .unwrap_or(defaults.interval_secs),
        revision_timeout_secs: args
            .revision_timeout
            .or(build.revision_timeout_secs)
            .unwrap_or(defaults.revision_timeout_secs),
        vcs_command: build.vcs_command.unwrap_or(defaults.vcs_command),
        build_command: build.build_command.unwrap_or(defaults.build_command),
    }
}
