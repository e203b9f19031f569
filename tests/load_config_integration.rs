//! Integration tests for the `load_config()` public API.
//!
//! These tests validate the end-to-end behaviour of `load_config()` from the
//! `towerline::config` module, from CLI arguments through to final
//! configuration values.


use std::io::Write;

use camino::Utf8PathBuf;
use rstest::rstest;
use serial_test::serial;
use tempfile::NamedTempFile;
use towerline::config::{Cli, Commands, load_config};
use towerline::error::{ConfigError, TowerlineError};

use test_utils::clear_towerline_env;

/// Helper: Creates a CLI struct for `test-connection`, which takes no
/// subcommand arguments.
const fn cli_with(config: Option<Utf8PathBuf>, server: Option<String>) -> Cli {
    Cli {
        command: Commands::TestConnection,
        config,
        server,
        credentials: None,
    }
}

/// Helper: Creates a temporary config file with the given TOML content.
fn temp_config_file(content: &str) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

fn utf8_path(file: &NamedTempFile) -> Utf8PathBuf {
    Utf8PathBuf::try_from(file.path().to_path_buf()).expect("path should be valid UTF-8")
}

const SERVERS_TOML: &str = r#"
    default_server = "prod"

    [servers.prod]
    url = "https://tower.example.com/"
    credentials_id = "deployer"

    [servers.lab]
    url = "https://lab.example.com"
    debug = true

    [credentials.deployer]
    username = "deploy"
    password = "hunter2"

    [polling]
    interval_secs = 10
"#;

#[test]
#[serial]
fn load_config_returns_defaults_when_no_sources_provided() {
    let _guard = clear_towerline_env();

    let config = load_config(&cli_with(None, None)).expect("defaults should load");

    assert!(config.default_server.is_none());
    assert!(config.servers.is_empty());
    assert_eq!(config.polling.interval_secs, 3);
    assert_eq!(config.polling.cancel_attempts, 10);
    assert!(config.logs.remove_color);
    assert!(!config.logs.import);
}

#[test]
#[serial]
fn load_config_loads_servers_and_credentials_from_file() {
    let _guard = clear_towerline_env();
    let file = temp_config_file(SERVERS_TOML).expect("failed to create temp config");

    let config = load_config(&cli_with(Some(utf8_path(&file)), None)).expect("file should load");

    let (name, server) = config.server(None).expect("default server should resolve");
    assert_eq!(name, "prod");
    assert_eq!(server.url, "https://tower.example.com");
    assert_eq!(server.credentials_id.as_deref(), Some("deployer"));
    assert_eq!(
        config
            .credentials
            .get("deployer")
            .and_then(|entry| entry.username.as_deref()),
        Some("deploy")
    );
    assert_eq!(config.polling.interval_secs, 10);
}

#[test]
#[serial]
fn load_config_cli_server_overrides_file_default() {
    let _guard = clear_towerline_env();
    let file = temp_config_file(SERVERS_TOML).expect("failed to create temp config");

    let config = load_config(&cli_with(Some(utf8_path(&file)), Some(String::from("lab"))))
        .expect("file should load");

    assert_eq!(config.default_server.as_deref(), Some("lab"));
    let (_, server) = config.server(None).expect("lab should resolve");
    assert!(server.debug);
}

#[test]
#[serial]
fn load_config_env_overrides_file() {
    let mut guard = clear_towerline_env();
    let file = temp_config_file(SERVERS_TOML).expect("failed to create temp config");
    guard.set("TOWERLINE_POLLING_INTERVAL_SECS", "1");
    guard.set("TOWERLINE_LOGS_IMPORT", "true");

    let config = load_config(&cli_with(Some(utf8_path(&file)), None)).expect("file should load");

    assert_eq!(config.polling.interval_secs, 1);
    assert!(config.logs.import);
}

#[rstest]
#[case("TOWERLINE_POLLING_INTERVAL_SECS", "soon")]
#[case("TOWERLINE_LOGS_REMOVE_COLOR", "maybe")]
#[serial]
fn load_config_rejects_malformed_env_values(#[case] key: &str, #[case] value: &str) {
    let mut guard = clear_towerline_env();
    guard.set(key, value);

    let result = load_config(&cli_with(None, None));

    assert!(result.is_err(), "{key}={value} should be rejected");
}

#[test]
#[serial]
fn load_config_reports_missing_explicit_file() {
    let _guard = clear_towerline_env();
    let missing = Utf8PathBuf::from("/nonexistent/towerline/config.toml");

    let error = load_config(&cli_with(Some(missing), None)).expect_err("missing file should fail");

    assert!(matches!(
        error,
        TowerlineError::Config(ConfigError::FileNotFound { .. })
    ));
}
