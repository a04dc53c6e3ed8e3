//! Integration tests for the `load_config()` public API.
//!
//! These tests validate the end-to-end behaviour of `load_config()` from the
//! `podwire::config` module, from CLI arguments through to final
//! configuration values.


use std::io::Write;

use camino::Utf8PathBuf;
use podwire::config::{Cli, Commands, load_config};
use serial_test::serial;
use tempfile::NamedTempFile;
use test_utils::PodwireEnv;

/// Helper: Creates a CLI struct with a config file path.
///
/// Uses the `Ping` subcommand as it requires no additional arguments.
const fn cli_with_config(config_path: Option<Utf8PathBuf>) -> Cli {
    Cli {
        config: config_path,
        engine_host: None,
        api_version: None,
        command: Commands::Ping,
    }
}

/// Helper: Creates a temporary config file with the given TOML content.
fn temp_config_file(content: &str) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

fn config_path(file: &NamedTempFile) -> Utf8PathBuf {
    Utf8PathBuf::try_from(file.path().to_path_buf()).expect("path should be valid UTF-8")
}

#[test]
#[serial]
fn load_config_returns_defaults_when_no_sources_provided() {
    let _env = PodwireEnv::isolate();

    let config = load_config(&cli_with_config(None)).expect("load_config should succeed");

    assert!(config.engine_host.is_none());
    assert!(!config.tls.verify);
    assert_eq!(config.timeouts.request_secs, 120);
    assert_eq!(config.timeouts.stream_secs, 86_400);
}

#[test]
#[serial]
fn load_config_loads_from_config_file() {
    let _env = PodwireEnv::isolate();

    let config_file = temp_config_file(
        r#"
        engine_host = "unix:///from/config/file.sock"

        [timeouts]
        request_secs = 15
        "#,
    )
    .expect("failed to create temp config");

    let config = load_config(&cli_with_config(Some(config_path(&config_file))))
        .expect("load_config should succeed");

    assert_eq!(
        config.engine_host.as_deref(),
        Some("unix:///from/config/file.sock")
    );
    assert_eq!(config.timeouts.request_secs, 15);
    assert_eq!(config.timeouts.stream_secs, 86_400);
}

#[test]
#[serial]
fn load_config_cli_overrides_env_and_file() {
    let env = PodwireEnv::isolate();

    let config_file = temp_config_file(r#"engine_host = "unix:///from/file.sock""#)
        .expect("failed to create temp config");
    env.set("PODWIRE_ENGINE_HOST", "unix:///from/env.sock");
    env.set("PODWIRE_TLS_VERIFY", "true");

    let cli = Cli {
        config: Some(config_path(&config_file)),
        engine_host: Some(String::from("tcp://from-cli:2375")),
        api_version: None,
        command: Commands::Ping,
    };
    let config = load_config(&cli).expect("load_config should succeed");

    assert_eq!(config.engine_host.as_deref(), Some("tcp://from-cli:2375"));
    assert!(config.tls.verify);
}

#[test]
#[serial]
fn load_config_handles_missing_config_file_gracefully() {
    let _env = PodwireEnv::isolate();

    let cli = cli_with_config(Some(Utf8PathBuf::from("/nonexistent/config.toml")));
    let config = load_config(&cli).expect("load_config should succeed for missing file");

    assert!(config.engine_host.is_none());
}

#[test]
#[serial]
fn load_config_rejects_malformed_config_file() {
    let _env = PodwireEnv::isolate();

    let config_file =
        temp_config_file("this is not valid TOML {{{").expect("failed to create temp config");
    let result = load_config(&cli_with_config(Some(config_path(&config_file))));

    assert!(result.is_err(), "load_config should fail for malformed TOML");
}

#[test]
#[serial]
fn load_config_fails_on_invalid_bool_env_var() {
    let env = PodwireEnv::isolate();
    env.set("PODWIRE_TLS_VERIFY", "maybe");

    let result = load_config(&cli_with_config(None));

    let error = result.expect_err("invalid bool should be rejected");
    assert!(
        error.to_string().contains("PODWIRE_TLS_VERIFY"),
        "unexpected error: {error}"
    );
}

#[test]
#[serial]
fn load_config_fails_on_invalid_u64_env_var() {
    let env = PodwireEnv::isolate();
    env.set("PODWIRE_TIMEOUTS_REQUEST_SECS", "soon");

    let result = load_config(&cli_with_config(None));

    assert!(result.is_err(), "invalid integer should be rejected");
}

#[test]
#[serial]
fn load_config_reads_typed_env_vars() {
    let env = PodwireEnv::isolate();
    env.set("PODWIRE_TIMEOUTS_STREAM_SECS", "300");
    env.set("PODWIRE_TLS_CERT_PATH", "/etc/podwire/certs");

    let config = load_config(&cli_with_config(None)).expect("load_config should succeed");

    assert_eq!(config.timeouts.stream_secs, 300);
    assert_eq!(
        config.tls.cert_path.as_ref().map(|path| path.as_str()),
        Some("/etc/podwire/certs")
    );
}
