//! Configuration system for towerline.
//!
//! This module provides the configuration structures and CLI definitions for
//! the towerline application. Configuration loading and precedence merging is
//! handled by the `ortho_config` crate. Precedence: CLI flags override
//! environment variables, which override configuration files, which override
//! defaults.
//!
//! The configuration file is expected at `~/.config/towerline/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! default_server = "prod"
//!
//! [servers.prod]
//! url = "https://controller.example.com"
//! credentials_id = "deployer"
//! trust_cert = false
//!
//! [credentials.deployer]
//! username = "deploy"
//! password = "hunter2"
//!
//! [polling]
//! interval_secs = 3
//!
//! [logs]
//! import = true
//! remove_color = true
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, OutputArgs, RevisionArgs, RunArgs, SyncArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{AppConfig, CredentialEntry, LogsConfig, PollingConfig, ServerConfig};
