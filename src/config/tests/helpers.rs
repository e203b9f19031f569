//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use ortho_config::MergeComposer;
use rstest::fixture;

use crate::config::AppConfig;

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        default_server = "prod"

        [servers.prod]
        url = "https://controller.example.com/"
        credentials_id = "deployer"
        trust_cert = true

        [servers.lab]
        url = "http://lab.internal"
        debug = true

        [credentials.deployer]
        username = "deploy"
        password = "hunter2"

        [credentials.robot]
        secret = "abc123"

        [polling]
        interval_secs = 5
        cancel_attempts = 4

        [logs]
        import = true
        remove_color = false
        workflow_child_logs = true
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Helper: Creates a `MergeComposer` with defaults layer already pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(AppConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Helper: Merges layers from a composer into `AppConfig`.
pub fn merge_config(composer: MergeComposer) -> Result<AppConfig, Arc<ortho_config::OrthoError>> {
    AppConfig::merge_from_layers(composer.layers())
}

/// Helper: Asserts that a config has all default values.
pub fn assert_config_has_defaults(config: &AppConfig) {
    assert!(
        config.default_server.is_none(),
        "default_server should be None"
    );
    assert!(config.servers.is_empty(), "servers should be empty");
    assert!(config.credentials.is_empty(), "credentials should be empty");
    assert_eq!(config.polling.interval_secs, 3);
    assert_eq!(config.polling.cancel_attempts, 10);
    assert_eq!(config.polling.cancel_interval_secs, 1);
    assert!(!config.logs.import, "logs.import should be false");
    assert!(config.logs.remove_color, "logs.remove_color should be true");
    assert!(!config.logs.full_logs, "logs.full_logs should be false");
    assert!(
        !config.logs.workflow_child_logs,
        "logs.workflow_child_logs should be false"
    );
}
