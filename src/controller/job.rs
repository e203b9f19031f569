//! A launched job and its lifecycle queries.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::connection::ControllerConnection;
use super::log_fetch::LogSource;
use super::logs::LogProcessor;
use super::template::TemplateKind;
use crate::error::{ControllerError, JobError, Result};

/// Attempt budget for confirming a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelSettings {
    /// Confirmation polls after the cancel request.
    pub attempts: u32,
    /// Sleep between confirmation polls.
    pub interval: Duration,
}

impl Default for CancelSettings {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(1),
        }
    }
}

/// A job that the Controller has accepted.
///
/// A value only exists once the server has assigned an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerJob {
    id: u64,
    kind: TemplateKind,
}

impl ControllerJob {
    /// Wraps a job identifier returned by a launch.
    #[must_use]
    pub const fn new(id: u64, kind: TemplateKind) -> Self {
        Self { id, kind }
    }

    /// Server-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Kind of template the job was launched from.
    #[must_use]
    pub const fn kind(&self) -> TemplateKind {
        self.kind
    }

    /// Where this job's output is read from.
    #[must_use]
    pub const fn log_source(&self) -> LogSource {
        if self.kind.runs_as_workflow() {
            LogSource::WorkflowNode(self.id)
        } else {
            LogSource::Job(self.id)
        }
    }

    fn resource(&self) -> String {
        format!("{}{}/", self.kind.jobs_endpoint(), self.id)
    }

    /// Web UI link for the job.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        format!("{base_url}/#/{}/{}", self.kind.url_fragment(), self.id)
    }

    async fn load(&self, connection: &mut ControllerConnection, context: &str) -> Result<Value> {
        connection.get_json(&self.resource(), context).await
    }

    /// Reports whether the job has finished.
    ///
    /// On completion any `artifacts.JENKINS_EXPORT` entries are merged into
    /// `processor`.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::MalformedResponse` when the job has no
    /// `finished` field.
    pub async fn is_complete(
        &self,
        connection: &mut ControllerConnection,
        processor: &mut LogProcessor,
    ) -> Result<bool> {
        const CONTEXT: &str = "checking job completion";

        let job = self.load(connection, CONTEXT).await?;
        let finished = job
            .get("finished")
            .ok_or_else(|| ControllerError::MalformedResponse {
                context: String::from(CONTEXT),
                message: String::from("missing 'finished'"),
            })?;
        if finished.is_null() {
            return Ok(false);
        }
        processor.harvest_artifacts(&job);
        debug!(job_id = self.id, "job finished");
        Ok(true)
    }

    /// Reports whether the job failed.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::MalformedResponse` when the job has no
    /// boolean `failed` field.
    pub async fn is_failed(&self, connection: &mut ControllerConnection) -> Result<bool> {
        const CONTEXT: &str = "checking job result";

        let job = self.load(connection, CONTEXT).await?;
        job.get("failed").and_then(Value::as_bool).ok_or_else(|| {
            ControllerError::MalformedResponse {
                context: String::from(CONTEXT),
                message: String::from("missing 'failed'"),
            }
            .into()
        })
    }

    async fn can_cancel(&self, connection: &mut ControllerConnection) -> Result<bool> {
        const CONTEXT: &str = "checking whether the job can be cancelled";

        let state = connection
            .get_json(&format!("{}cancel/", self.resource()), CONTEXT)
            .await?;
        // A reply without the flag does not block cancelling.
        let can_cancel = state.get("can_cancel").and_then(Value::as_bool);
        if can_cancel.is_none() {
            debug!(job_id = self.id, "cancel state has no 'can_cancel' flag");
        }
        Ok(can_cancel.unwrap_or(true))
    }

    /// Requests cancellation and waits for the server to confirm it.
    ///
    /// # Errors
    ///
    /// - `JobError::NotCancellable` when the server says the job cannot be
    ///   cancelled; no cancel request is sent in that case
    /// - `JobError::CancelTimeout` when confirmation does not arrive within
    ///   `settings.attempts` polls
    /// - `ControllerError::UnexpectedStatus` when the cancel request is not
    ///   accepted with `202`
    pub async fn cancel(
        &self,
        connection: &mut ControllerConnection,
        settings: CancelSettings,
    ) -> Result<()> {
        if !self.can_cancel(connection).await? {
            return Err(JobError::NotCancellable.into());
        }

        let response = connection
            .request(Method::POST, &format!("{}cancel/", self.resource()), None)
            .await?;
        if response.status != 202 {
            return Err(response.unexpected("cancelling a job").into());
        }
        info!(job_id = self.id, "cancel requested");

        for attempt in 1..=settings.attempts {
            if !self.can_cancel(connection).await? {
                info!(job_id = self.id, attempt, "job cancelled");
                return Ok(());
            }
            tokio::time::sleep(settings.interval).await;
        }

        warn!(job_id = self.id, attempts = settings.attempts, "cancel not confirmed");
        Err(JobError::CancelTimeout.into())
    }
}
