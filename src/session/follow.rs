//! The polling loop shared by template runs and project syncs.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::OperationStatus;
use crate::controller::{
    CancelSettings, ControllerConnection, ControllerJob, LogFetcher, LogProcessor, ProjectSync,
};
use crate::error::Result;

/// Something the Controller runs that can be polled to completion.
pub(crate) trait Followed {
    /// Lines produced since the previous call.
    async fn fetch_logs(&mut self, connection: &mut ControllerConnection) -> Result<Vec<String>>;

    /// Whether the remote work has finished.
    async fn is_complete(&mut self, connection: &mut ControllerConnection) -> Result<bool>;

    /// Whether the finished work failed.
    async fn is_failed(&mut self, connection: &mut ControllerConnection) -> Result<bool>;

    /// Cancels the remote work.
    async fn cancel(
        &mut self,
        connection: &mut ControllerConnection,
        settings: CancelSettings,
    ) -> Result<()>;
}

/// A launched template job and its log state.
pub(crate) struct JobFollower {
    pub(crate) job: ControllerJob,
    pub(crate) fetcher: LogFetcher,
}

impl Followed for JobFollower {
    async fn fetch_logs(&mut self, connection: &mut ControllerConnection) -> Result<Vec<String>> {
        self.fetcher.fetch(connection, self.job.log_source()).await
    }

    async fn is_complete(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        self.job
            .is_complete(connection, self.fetcher.processor_mut())
            .await
    }

    async fn is_failed(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        self.job.is_failed(connection).await
    }

    async fn cancel(
        &mut self,
        connection: &mut ControllerConnection,
        settings: CancelSettings,
    ) -> Result<()> {
        self.job.cancel(connection, settings).await
    }
}

/// A started project sync and its log state.
pub(crate) struct SyncFollower {
    pub(crate) sync: ProjectSync,
    pub(crate) processor: LogProcessor,
}

impl Followed for SyncFollower {
    async fn fetch_logs(&mut self, connection: &mut ControllerConnection) -> Result<Vec<String>> {
        self.sync.logs(connection, &mut self.processor).await
    }

    async fn is_complete(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        self.sync.is_complete(connection).await
    }

    async fn is_failed(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        self.sync.is_failed(connection).await
    }

    async fn cancel(
        &mut self,
        connection: &mut ControllerConnection,
        _settings: CancelSettings,
    ) -> Result<()> {
        self.sync.cancel(connection).await
    }
}

/// Timing and interruption for one polling loop.
pub(crate) struct PollPlan<'a> {
    pub(crate) interval: Duration,
    pub(crate) cancel_settings: CancelSettings,
    pub(crate) token: &'a CancellationToken,
    pub(crate) import_logs: bool,
}

/// Polls `target` until it finishes or `plan.token` is cancelled.
///
/// Output is handed to `emit` once per poll. The final fetch after
/// completion can miss events the server has not indexed yet.
pub(crate) async fn follow<T: Followed>(
    connection: &mut ControllerConnection,
    target: &mut T,
    plan: &PollPlan<'_>,
    mut emit: impl FnMut(&[String]),
) -> Result<OperationStatus> {
    loop {
        if plan.token.is_cancelled() {
            emit(&[String::from("Attempting to cancel launched job")]);
            target.cancel(connection, plan.cancel_settings).await?;
            info!("remote work cancelled");
            return Ok(OperationStatus::Cancelled);
        }

        if plan.import_logs {
            let lines = target.fetch_logs(connection).await?;
            emit(&lines);
        }

        if target.is_complete(connection).await? {
            break;
        }

        debug!(interval = ?plan.interval, "waiting before next poll");
        tokio::select! {
            () = plan.token.cancelled() => {}
            () = tokio::time::sleep(plan.interval) => {}
        }
    }

    if plan.import_logs {
        let lines = target.fetch_logs(connection).await?;
        emit(&lines);
    }

    if target.is_failed(connection).await? {
        Ok(OperationStatus::Failed)
    } else {
        Ok(OperationStatus::Success)
    }
}
