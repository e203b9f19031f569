//! Pipeline-facing operations against one Controller.
//!
//! A [`ControllerSession`] bundles a [`ControllerConnection`] with the
//! polling settings, output sink and input expander of one operation. Each
//! operation ([`run_template`](ControllerSession::run_template),
//! [`sync_project`](ControllerSession::sync_project),
//! [`update_revision`](ControllerSession::update_revision) and
//! [`test_connection`](ControllerSession::test_connection)) releases any
//! server-issued token before it returns, whatever the outcome.
//!
//! Operations never print. Lines go to the [`LogSink`] and results come back
//! as an [`OperationReport`] that front ends map to exit codes.

mod expand;
mod follow;
mod run;
mod sink;
mod sync;


pub use expand::{EnvExpander, VariableExpander};
pub use run::RunRequest;
pub use sink::{CollectingSink, LogSink};
pub use sync::SyncRequest;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{AppConfig, PollingConfig};
use crate::controller::{CancelSettings, ControllerConnection, Project};
use crate::error::{ConfigError, Result};
use crate::secrets::CredentialProvider;

/// How a followed operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// The job or sync finished successfully.
    Success,
    /// The job or sync finished and reported failure.
    Failed,
    /// The operation was interrupted and the remote job cancelled.
    Cancelled,
    /// The job or sync was started and not followed.
    Launched,
}

impl OperationStatus {
    /// Whether a front end should report success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::Launched)
    }
}

/// Ordered string results returned to the caller.
///
/// Keys keep their first insertion position; re-inserting a key replaces
/// its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultBag {
    entries: Vec<(String, String)>,
}

impl ResultBag {
    /// Sets `name` to `content`.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        let key = name.into();
        let value = content.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for ResultBag {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, content) in iter {
            self.insert(name, content);
        }
    }
}

/// Result of a run or sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    /// How the operation ended.
    pub status: OperationStatus,
    /// Identifiers, links, result and exported variables.
    pub results: ResultBag,
}

/// How a launched job or sync is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowOptions {
    /// Stream output while polling.
    pub import_logs: bool,
    /// Strip ANSI colour sequences.
    pub remove_color: bool,
    /// Prefer task result messages over raw event output.
    pub full_logs: bool,
    /// Stream each workflow child's output.
    pub workflow_child_logs: bool,
    /// Return right after launch without polling.
    pub detach: bool,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            import_logs: false,
            remove_color: true,
            full_logs: false,
            workflow_child_logs: false,
            detach: false,
        }
    }
}

/// Opens a connection to the server selected from `config`.
///
/// `server` overrides `default_server`, and `credentials_id` overrides the
/// server's `credentials_id`. A server without credentials yields a
/// connection that fails on its first authenticated request.
///
/// # Errors
///
/// Returns `ConfigError::MissingRequired` or `ConfigError::UnknownServer`
/// when no server definition is found, and
/// `ConfigError::UnknownCredentials` when the credentials identifier is not
/// known to `provider`.
pub async fn connect<P: CredentialProvider + ?Sized>(
    config: &AppConfig,
    server: Option<&str>,
    credentials_id: Option<&str>,
    provider: &P,
) -> Result<ControllerConnection> {
    let (name, definition) = config.server(server)?;
    let selected = credentials_id
        .map(str::to_owned)
        .or_else(|| definition.credentials_id.clone());
    let credentials = match selected {
        Some(id) => Some(provider.lookup(&id).ok_or(ConfigError::UnknownCredentials {
            server: name.clone(),
            id,
        })?),
        None => None,
    };

    info!(server = %name, url = %definition.url, "connecting to Controller");
    ControllerConnection::open(&definition.url, definition.trust_cert, credentials).await
}

/// One Controller session driving pipeline operations.
///
/// # Type Parameters
///
/// * `S` - Receiver of emitted lines.
/// * `X` - Expander applied to every string input.
#[derive(Debug)]
pub struct ControllerSession<S: LogSink, X: VariableExpander> {
    connection: ControllerConnection,
    polling: PollingConfig,
    sink: S,
    expander: X,
    cancel: CancellationToken,
}

impl<S: LogSink, X: VariableExpander> ControllerSession<S, X> {
    /// Creates a session over an open connection.
    #[must_use]
    pub fn new(
        connection: ControllerConnection,
        polling: PollingConfig,
        sink: S,
        expander: X,
    ) -> Self {
        Self {
            connection,
            polling,
            sink,
            expander,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to interrupt polling.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &ControllerConnection {
        &self.connection
    }

    /// The output sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the session, returning the output sink.
    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    const fn cancel_settings(&self) -> CancelSettings {
        CancelSettings {
            attempts: self.polling.cancel_attempts,
            interval: self.polling.cancel_interval(),
        }
    }

    fn emit(&mut self, lines: &[String]) {
        if !lines.is_empty() {
            self.sink.emit(lines);
        }
    }

    fn expand(&self, value: &str) -> String {
        self.expander.expand(value)
    }

    fn expand_opt(&self, value: Option<&str>) -> Option<String> {
        value.map(|v| self.expander.expand(v))
    }

    /// Points a project at a different source control revision.
    ///
    /// # Errors
    ///
    /// Returns the lookup, validation or transport error raised while
    /// updating.
    pub async fn update_revision(&mut self, project: &str, revision: &str) -> Result<bool> {
        let project_ref = self.expand(project);
        let revision_ref = self.expand(revision);
        let outcome = async {
            let found = Project::find(&mut self.connection, &project_ref).await?;
            found.update_revision(&mut self.connection, &revision_ref).await
        }
        .await;
        self.connection.release().await;
        outcome
    }

    /// Verifies that the configured credentials can read the job list.
    ///
    /// # Errors
    ///
    /// Returns the authentication or transport error raised by the check.
    pub async fn test_connection(&mut self) -> Result<()> {
        self.connection.test_connection().await
    }
}
