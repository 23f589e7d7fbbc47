// src/config/validate.rs

use crate::config::model::{RawSettings, Settings};
use crate::errors::{RebuilddError, Result};

impl TryFrom<RawSettings> for Settings {
    type Error = RebuilddError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_settings(&raw)?;
        Ok(Settings::new_unchecked(raw))
    }
}

fn validate_settings(raw: &RawSettings) -> Result<()> {
    validate_intervals(raw)?;
    validate_non_empty("build.artifacts_path", &raw.artifacts_path)?;
    validate_non_empty("build.registry_path", &raw.registry_path)?;
    validate_non_empty("build.vcs_command", &raw.vcs_command)?;
    validate_non_empty("build.build_command", &raw.build_command)?;
    validate_non_empty("server.host", &raw.host)?;
    Ok(())
}

fn validate_intervals(raw: &RawSettings) -> Result<()> {
    if raw.interval_secs == 0 {
        return Err(RebuilddError::ConfigError(
            "build interval must be >= 1 second (got 0)".to_string(),
        ));
    }
    if raw.revision_timeout_secs == 0 {
        return Err(RebuilddError::ConfigError(
            "revision timeout must be >= 1 second (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_non_empty(key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RebuilddError::ConfigError(format!(
            "{key} must not be empty"
        )));
    }
    Ok(())
}
