use std::error::Error;
use std::io::Write;
use std::time::Duration;

use rebuildd::cli::CliArgs;
use rebuildd::config::loader::merge;
use rebuildd::config::{load_from_path, resolve_settings, RawConfigFile, RawSettings, Settings};
use rebuildd::errors::RebuilddError;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn no_flags_no_file_yields_defaults() -> TestResult {
    let settings = resolve_settings(&CliArgs::default())?;
    assert_eq!(settings.host(), "0.0.0.0");
    assert_eq!(settings.port(), 8090);
    assert_eq!(settings.listen_addr(), "0.0.0.0:8090");
    assert_eq!(settings.artifacts_path().to_str(), Some("artifacts"));
    assert_eq!(settings.registry_path().to_str(), Some("registry.json"));
    assert_eq!(settings.build_interval(), Duration::from_secs(10));
    assert_eq!(settings.revision_timeout(), Duration::from_secs(30));
    assert_eq!(settings.vcs_command(), "git");
    assert_eq!(settings.build_command(), "make");
    Ok(())
}

#[test]
fn file_values_override_defaults() -> TestResult {
    let file = write_config(
        r#"
[server]
port = 9000

[build]
artifacts_path = "/var/lib/rebuildd/artifacts"
interval_secs = 60
build_command = "gmake"
"#,
    )?;

    let args = CliArgs {
        config: Some(file.path().to_string_lossy().into_owned()),
        ..CliArgs::default()
    };
    let settings = resolve_settings(&args)?;
    assert_eq!(settings.port(), 9000);
    assert_eq!(settings.host(), "0.0.0.0");
    assert_eq!(
        settings.artifacts_path().to_str(),
        Some("/var/lib/rebuildd/artifacts")
    );
    assert_eq!(settings.build_interval(), Duration::from_secs(60));
    assert_eq!(settings.build_command(), "gmake");
    assert_eq!(settings.vcs_command(), "git");
    Ok(())
}

#[test]
fn cli_flags_override_file_values() -> TestResult {
    let file: RawConfigFile = toml::from_str(
        r#"
[server]
host = "127.0.0.1"
port = 9000

[build]
registry_path = "/etc/registry.json"
interval_secs = 60
"#,
    )?;
    let args = CliArgs {
        port: Some(7000),
        build_interval: Some(5),
        ..CliArgs::default()
    };

    let merged = merge(&args, file);
    assert_eq!(
        merged,
        RawSettings {
            host: "127.0.0.1".into(),
            port: 7000,
            registry_path: "/etc/registry.json".into(),
            interval_secs: 5,
            ..RawSettings::default()
        }
    );
    Ok(())
}

#[test]
fn zero_interval_is_rejected() {
    let raw = RawSettings {
        interval_secs: 0,
        ..RawSettings::default()
    };
    let err = Settings::try_from(raw).expect_err("zero interval accepted");
    assert!(matches!(err, RebuilddError::ConfigError(ref m) if m.contains("interval")));
}

#[test]
fn zero_revision_timeout_is_rejected() {
    let raw = RawSettings {
        revision_timeout_secs: 0,
        ..RawSettings::default()
    };
    assert!(matches!(
        Settings::try_from(raw),
        Err(RebuilddError::ConfigError(_))
    ));
}

#[test]
fn empty_paths_and_commands_are_rejected() {
    let cases = [
        RawSettings {
            artifacts_path: String::new(),
            ..RawSettings::default()
        },
        RawSettings {
            registry_path: "  ".into(),
            ..RawSettings::default()
        },
        RawSettings {
            build_command: String::new(),
            ..RawSettings::default()
        },
        RawSettings {
            host: String::new(),
            ..RawSettings::default()
        },
    ];
    for raw in cases {
        let err = Settings::try_from(raw.clone()).expect_err("empty value accepted");
        assert!(
            matches!(err, RebuilddError::ConfigError(ref m) if m.contains("must not be empty")),
            "{raw:?}"
        );
    }
}

#[test]
fn malformed_toml_is_reported() -> TestResult {
    let file = write_config("[build]\ninterval_secs = \"soon\"\n")?;
    assert!(matches!(
        load_from_path(file.path()),
        Err(RebuilddError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_config_file_is_an_io_error() {
    let args = CliArgs {
        config: Some("/nonexistent/rebuildd.toml".into()),
        ..CliArgs::default()
    };
    assert!(matches!(
        resolve_settings(&args),
        Err(RebuilddError::IoError(_))
    ));
}
