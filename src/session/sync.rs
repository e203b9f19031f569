//! Syncing a project from source control.

use tracing::info;

use super::follow::{PollPlan, SyncFollower, follow};
use super::{
    ControllerSession, FollowOptions, LogSink, OperationReport, OperationStatus, ResultBag,
    VariableExpander,
};
use crate::controller::{LogProcessor, Project};
use crate::error::Result;

/// Everything needed to sync one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Project name or identifier.
    pub project: String,
    /// How the sync is followed.
    pub follow: FollowOptions,
}

impl<S: LogSink, X: VariableExpander> ControllerSession<S, X> {
    /// Starts a project sync and, unless detached, follows it to the end.
    ///
    /// The report carries `SYNC_ID` and `SYNC_URL`; a followed sync adds
    /// `SYNC_RESULT` (`SUCCESS` or `FAILED`).
    ///
    /// # Errors
    ///
    /// - lookup errors for the project
    /// - `ControllerError::ProjectNotSyncable` for a manual project
    /// - `JobError::NotCancellable` when an interrupted sync cannot be
    ///   cancelled
    pub async fn sync_project(&mut self, request: &SyncRequest) -> Result<OperationReport> {
        let outcome = self.sync_project_inner(request).await;
        self.connection.release().await;
        outcome
    }

    async fn sync_project_inner(&mut self, request: &SyncRequest) -> Result<OperationReport> {
        let project_ref = self.expand(&request.project);
        let mut project = Project::find(&mut self.connection, &project_ref).await?;
        let sync = project.sync(&mut self.connection).await?;
        let url = sync.web_url(self.connection.base_url());
        self.emit(&[format!("Project Sync URL: {url}")]);

        let mut results = ResultBag::default();
        results.insert("SYNC_ID", sync.id().to_string());
        results.insert("SYNC_URL", url);

        if request.follow.detach {
            info!(project = project.name(), sync_id = sync.id(), "not following project sync");
            return Ok(OperationReport {
                status: OperationStatus::Launched,
                results,
            });
        }

        let sync_id = sync.id();
        let mut follower = SyncFollower {
            sync,
            processor: LogProcessor::new(request.follow.remove_color),
        };
        let plan = PollPlan {
            interval: self.polling.interval(),
            cancel_settings: self.cancel_settings(),
            token: &self.cancel,
            import_logs: request.follow.import_logs,
        };
        let sink = &mut self.sink;
        let status = follow(&mut self.connection, &mut follower, &plan, |lines| {
            if !lines.is_empty() {
                sink.emit(lines);
            }
        })
        .await?;

        match status {
            OperationStatus::Success => results.insert("SYNC_RESULT", "SUCCESS"),
            OperationStatus::Failed => results.insert("SYNC_RESULT", "FAILED"),
            OperationStatus::Cancelled | OperationStatus::Launched => {}
        }
        results.extend(follower.processor.into_exports());
        info!(project = project.name(), sync_id, ?status, "project sync finished");

        Ok(OperationReport { status, results })
    }
}
