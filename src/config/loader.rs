//! Configuration loading with layered precedence.
//!
//! Layers are applied lowest to highest: application defaults, configuration
//! file, environment variables, command-line arguments.
//!
//! # Manual Layer Composition
//!
//! The `OrthoConfig` derive offers `load()`, but the loader drives
//! `MergeComposer` directly:
//!
//! 1. **Subcommand separation**: `Cli` owns subcommand dispatch while
//!    `AppConfig` only holds configuration values.
//! 2. **Fail-fast environment parsing**: unparseable typed values are reported
//!    instead of being silently ignored.
//! 3. **Explicit config path**: `--config` must win over discovery, and a
//!    path that does not exist is an error rather than a silent fallback.
//! 4. **Map-valued sections**: `[servers.*]` and `[credentials.*]` are keyed by
//!    user-chosen names and have no flat CLI representation.
//!
//! # Environment Variables
//!
//! String fields (e.g., `TOWERLINE_DEFAULT_SERVER`) are always accepted. Typed
//! fields such as `TOWERLINE_LOGS_IMPORT` (bool) or
//! `TOWERLINE_POLLING_INTERVAL_SECS` (integer) must parse or loading fails.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::{DefaultEnv, Env};
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// Always accepted.
    String,
    /// `true` or `false`.
    Bool,
    /// Unsigned 64-bit integer.
    U64,
}

/// Maps one environment variable onto a configuration path.
struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

/// Every environment variable the loader understands.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "TOWERLINE_DEFAULT_SERVER",
        path: &["default_server"],
        var_type: EnvVarType::String,
    },
    // Polling
    EnvVarSpec {
        env_var: "TOWERLINE_POLLING_INTERVAL_SECS",
        path: &["polling", "interval_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "TOWERLINE_POLLING_CANCEL_ATTEMPTS",
        path: &["polling", "cancel_attempts"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "TOWERLINE_POLLING_CANCEL_INTERVAL_SECS",
        path: &["polling", "cancel_interval_secs"],
        var_type: EnvVarType::U64,
    },
    // Logs
    EnvVarSpec {
        env_var: "TOWERLINE_LOGS_IMPORT",
        path: &["logs", "import"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "TOWERLINE_LOGS_REMOVE_COLOR",
        path: &["logs", "remove_color"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "TOWERLINE_LOGS_FULL_LOGS",
        path: &["logs", "full_logs"],
        var_type: EnvVarType::Bool,
    },
    EnvVarSpec {
        env_var: "TOWERLINE_LOGS_WORKFLOW_CHILD_LOGS",
        path: &["logs", "workflow_child_logs"],
        var_type: EnvVarType::Bool,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `TOWERLINE_*` variable without keeping a
/// second list in sync.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a TOML configuration file through a `cap_std` directory handle and
/// push it onto the composer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    debug!(%path, "loaded configuration file");
    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Resolve which configuration file to read, if any.
fn config_file_path(cli: &Cli) -> Result<Option<Utf8PathBuf>> {
    if let Some(path) = cli.config.as_ref() {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.clone().into_std_path_buf(),
            }
            .into());
        }
        return Ok(Some(path.clone()));
    }

    let discovery = ConfigDiscovery::builder("towerline")
        .env_var("TOWERLINE_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".towerline.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok()))
}

/// Load configuration with full layer precedence from the process
/// environment.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `--config` names a file that does not exist
/// - the configuration file is malformed
/// - a typed environment variable has an invalid value (e.g., non-boolean
///   `TOWERLINE_LOGS_IMPORT`)
/// - merging the layers fails
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &DefaultEnv::new())
}

/// Load configuration reading environment variables through `env`.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with_env(cli: &Cli, env: &impl Env) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_file_path(cli)? {
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    Ok(config)
}

/// Parse one raw environment value according to its declared type.
fn parse_env_value(spec: &EnvVarSpec, raw_value: String) -> Result<Value> {
    match spec.var_type {
        EnvVarType::String => Ok(Value::String(raw_value)),
        EnvVarType::Bool => raw_value.parse::<bool>().map(Value::Bool).map_err(|_| {
            ConfigError::InvalidValue {
                field: spec.env_var.to_owned(),
                reason: format!("expected bool (true/false), got '{raw_value}'"),
            }
            .into()
        }),
        EnvVarType::U64 => raw_value
            .parse::<u64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|_| {
                ConfigError::InvalidValue {
                    field: spec.env_var.to_owned(),
                    reason: format!("expected unsigned integer, got '{raw_value}'"),
                }
                .into()
            }),
    }
}

/// Collect `TOWERLINE_*` environment variables into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a typed variable does not parse.
fn collect_env_vars(env: &impl Env) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };
        let json_value = parse_env_value(spec, raw_value)?;
        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path, creating intermediate objects.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
///
/// Only `--server` maps onto a configuration field. `--credentials` selects
/// an entry when the session is built.
fn build_cli_overrides(cli: &Cli) -> Value {
    cli.server.as_ref().map_or(Value::Null, |server| {
        let mut overrides = Map::new();
        overrides.insert(
            String::from("default_server"),
            Value::String(server.clone()),
        );
        Value::Object(overrides)
    })
}
