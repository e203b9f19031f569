//! Configuration data types for towerline.

use std::collections::BTreeMap;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::error::{ConfigError, Result};

/// Connection details for one Controller installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the Controller, without a trailing slash.
    pub url: String,

    /// Identifier of the entry in `[credentials]` used for this server.
    pub credentials_id: Option<String>,

    /// Accept any TLS certificate presented by the server.
    pub trust_cert: bool,

    /// Emit request-level diagnostics for this server.
    pub debug: bool,
}

/// Stored credential material.
///
/// Either `secret` (a pre-issued OAuth token) or the `username`/`password`
/// pair is expected. When both are present the secret wins.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialEntry {
    /// Account name.
    pub username: Option<String>,

    /// Account password.
    pub password: Option<String>,

    /// Pre-issued bearer token.
    pub secret: Option<String>,
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Timing of the job polling loop.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds to sleep between completion checks.
    #[default = 3]
    pub interval_secs: u64,

    /// Number of confirmation polls after requesting cancellation.
    #[default = 10]
    pub cancel_attempts: u32,

    /// Seconds between cancellation confirmation polls.
    #[default = 1]
    pub cancel_interval_secs: u64,
}

impl PollingConfig {
    /// Returns the sleep between completion checks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Returns the sleep between cancellation confirmation polls.
    #[must_use]
    pub const fn cancel_interval(&self) -> Duration {
        Duration::from_secs(self.cancel_interval_secs)
    }
}

/// Defaults for log import while following a job.
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Deserialize, Serialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Stream job output while polling.
    pub import: bool,

    /// Strip ANSI colour sequences from emitted lines.
    #[default = true]
    pub remove_color: bool,

    /// Prefer task result messages over raw event output.
    pub full_logs: bool,

    /// Stream the output of each workflow child job.
    pub workflow_child_logs: bool,
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `TOWERLINE_CONFIG_PATH` environment variable
/// 2. `.towerline.toml` in the current working directory
/// 3. `.towerline.toml` in the home directory
/// 4. `~/.config/towerline/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "TOWERLINE",
    post_merge_hook,
    discovery(
        app_name = "towerline",
        env_var = "TOWERLINE_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".towerline.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Name of the server used when none is given on the command line.
    pub default_server: Option<String>,

    /// Known Controller installations keyed by name.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub servers: BTreeMap<String, ServerConfig>,

    /// Stored credentials keyed by identifier.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub credentials: BTreeMap<String, CredentialEntry>,

    /// Polling loop timing.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub polling: PollingConfig,

    /// Log import defaults.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub logs: LogsConfig,
}

impl AppConfig {
    /// Looks up a server definition by name, falling back to
    /// `default_server` when `name` is `None`. The returned URL never ends
    /// with `/`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when no name is given and no
    /// default is configured, `ConfigError::UnknownServer` when the name has
    /// no definition, and `ConfigError::InvalidValue` when the definition has
    /// an empty URL.
    pub fn server(&self, name: Option<&str>) -> Result<(String, ServerConfig)> {
        let selected = name
            .map(str::to_owned)
            .or_else(|| self.default_server.clone())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: String::from("default_server"),
            })?;

        let server = self
            .servers
            .get(&selected)
            .ok_or_else(|| ConfigError::UnknownServer {
                name: selected.clone(),
            })?;

        if server.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("servers.{selected}.url"),
                reason: String::from("cannot be empty"),
            }
            .into());
        }

        let mut resolved = server.clone();
        let trimmed_len = resolved.url.trim_end_matches('/').len();
        resolved.url.truncate(trimmed_len);
        Ok((selected, resolved))
    }
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        for server in self.servers.values_mut() {
            let trimmed_len = server.url.trim_end_matches('/').len();
            server.url.truncate(trimmed_len);
        }
        Ok(())
    }
}
