//! Projects, source control syncs and revision updates.

use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::connection::ControllerConnection;
use super::log_fetch::collect_events;
use super::logs::LogProcessor;
use super::resolver::{Collection, item_id, lookup};
use crate::error::{ControllerError, JobError, Result};

fn related<'a>(data: &'a Value, link: &str) -> Option<&'a str> {
    data.get("related")
        .and_then(|related| related.get(link))
        .and_then(Value::as_str)
}

fn malformed(context: &str, message: &str) -> ControllerError {
    ControllerError::MalformedResponse {
        context: context.to_owned(),
        message: message.to_owned(),
    }
}

/// A resolved project.
#[derive(Debug, Clone)]
pub struct Project {
    id: u64,
    data: Value,
    can_update: Option<bool>,
}

impl Project {
    /// Resolves `reference` and loads the full project record.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotFound` or `ControllerError::NotUnique`
    /// when the project does not resolve to exactly one item.
    pub async fn find(connection: &mut ControllerConnection, reference: &str) -> Result<Self> {
        let summary = lookup(connection, reference, Collection::Projects).await?;
        let id = item_id(&summary, "resolving a project")?;
        let data = connection
            .get_json(&format!("/projects/{id}/"), "loading a project")
            .await?;
        Ok(Self {
            id,
            data,
            can_update: None,
        })
    }

    /// Server-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Project name as reported by the server.
    #[must_use]
    pub fn name(&self) -> &str {
        self.data.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Whether the project can be updated from source control.
    ///
    /// The answer is read once from the `related.update` link and cached.
    ///
    /// # Errors
    ///
    /// Returns any error raised while reading the update link.
    pub async fn can_update(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        if let Some(cached) = self.can_update {
            return Ok(cached);
        }
        let answer = match related(&self.data, "update") {
            None => false,
            Some(link) => connection
                .get_json(link, "checking whether the project can be updated")
                .await?
                .get("can_update")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        debug!(project_id = self.id, can_update = answer, "project capability");
        self.can_update = Some(answer);
        Ok(answer)
    }

    /// Starts a source control update.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::ProjectNotSyncable` when the project cannot
    /// be updated, and `ControllerError::UnexpectedStatus` when the update is
    /// not accepted with `200` or `202`.
    pub async fn sync(&mut self, connection: &mut ControllerConnection) -> Result<ProjectSync> {
        const CONTEXT: &str = "starting a project sync";

        if !self.can_update(connection).await? {
            return Err(ControllerError::ProjectNotSyncable.into());
        }
        let link = related(&self.data, "update")
            .ok_or(ControllerError::ProjectNotSyncable)?
            .to_owned();

        let response = connection.request(Method::POST, &link, None).await?;
        if !matches!(response.status, 200 | 202) {
            return Err(response.unexpected(CONTEXT).into());
        }
        let sync = ProjectSync::from_state(response.json(CONTEXT)?)?;
        info!(project_id = self.id, sync_id = sync.id(), "project sync started");
        Ok(sync)
    }

    /// Points the project at a different source control revision.
    ///
    /// Returns `true` when the server echoes the requested revision back, or
    /// does not echo a revision at all.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::BadRequest` when the server rejects the
    /// revision and `ControllerError::UnexpectedStatus` for any status other
    /// than `200`.
    pub async fn update_revision(
        &self,
        connection: &mut ControllerConnection,
        revision: &str,
    ) -> Result<bool> {
        const CONTEXT: &str = "updating the project revision";

        let body = json!({ "scm_branch": revision });
        let response = connection
            .request(Method::PATCH, &format!("/projects/{}/", self.id), Some(&body))
            .await?;
        match response.status {
            200 => {
                let updated = response.json(CONTEXT)?;
                let applied = updated
                    .get("scm_branch")
                    .and_then(Value::as_str)
                    .is_none_or(|branch| branch == revision);
                info!(project_id = self.id, revision, applied, "project revision updated");
                Ok(applied)
            }
            400 => Err(ControllerError::BadRequest {
                body: response.body,
            }
            .into()),
            _ => Err(response.unexpected(CONTEXT).into()),
        }
    }
}

/// A running or finished project update.
#[derive(Debug, Clone)]
pub struct ProjectSync {
    id: u64,
    url: String,
    state: Value,
    watermark: u64,
}

impl ProjectSync {
    fn from_state(state: Value) -> Result<Self> {
        const CONTEXT: &str = "reading a project sync";

        let id = item_id(&state, CONTEXT)?;
        let url = state
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(CONTEXT, "missing 'url'"))?
            .to_owned();
        Ok(Self {
            id,
            url,
            state,
            watermark: 0,
        })
    }

    /// Server-assigned identifier of the update.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Web UI link for the update.
    #[must_use]
    pub fn web_url(&self, base_url: &str) -> String {
        format!("{base_url}/#/jobs/project/{}", self.id)
    }

    /// Highest event identifier emitted so far.
    #[must_use]
    pub const fn watermark(&self) -> u64 {
        self.watermark
    }

    async fn refresh(&mut self, connection: &mut ControllerConnection) -> Result<()> {
        self.state = connection
            .get_json(&self.url, "refreshing a project sync")
            .await?;
        Ok(())
    }

    /// Refreshes the update and reports whether it has finished.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::MalformedResponse` when the update has no
    /// `finished` field.
    pub async fn is_complete(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        self.refresh(connection).await?;
        let finished = self
            .state
            .get("finished")
            .ok_or_else(|| malformed("checking sync completion", "missing 'finished'"))?;
        Ok(!finished.is_null())
    }

    /// Refreshes the update and reports whether it failed.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::MalformedResponse` when the update has no
    /// boolean `failed` field.
    pub async fn is_failed(&mut self, connection: &mut ControllerConnection) -> Result<bool> {
        self.refresh(connection).await?;
        self.state
            .get("failed")
            .and_then(Value::as_bool)
            .ok_or_else(|| malformed("checking sync result", "missing 'failed'").into())
    }

    /// Fetches update events not yet emitted.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::MalformedResponse` when the update has no
    /// events link, or any error raised while reading events.
    pub async fn logs(
        &mut self,
        connection: &mut ControllerConnection,
        processor: &mut LogProcessor,
    ) -> Result<Vec<String>> {
        let events = related(&self.state, "events")
            .ok_or_else(|| malformed("reading sync events", "missing 'related.events'"))?
            .to_owned();
        let mut lines = Vec::new();
        collect_events(
            connection,
            &events,
            &mut self.watermark,
            false,
            processor,
            &mut lines,
        )
        .await?;
        Ok(lines)
    }

    /// Requests cancellation of the update.
    ///
    /// A `405` answer means the server refused; it is logged and not treated
    /// as an error.
    ///
    /// # Errors
    ///
    /// Returns `JobError::NotCancellable` when the server says the update
    /// cannot be cancelled, and `ControllerError::UnexpectedStatus` for a
    /// cancel answer other than `202` or `405`.
    pub async fn cancel(&self, connection: &mut ControllerConnection) -> Result<()> {
        const CONTEXT: &str = "cancelling a project sync";

        let link = related(&self.state, "cancel")
            .ok_or_else(|| malformed(CONTEXT, "missing 'related.cancel'"))?
            .to_owned();
        let can_cancel = connection
            .get_json(&link, CONTEXT)
            .await?
            .get("can_cancel")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if !can_cancel {
            return Err(JobError::NotCancellable.into());
        }

        let response = connection.request(Method::POST, &link, None).await?;
        match response.status {
            202 => {
                info!(sync_id = self.id, "project sync cancel requested");
                Ok(())
            }
            405 => {
                warn!(sync_id = self.id, "Controller refused to cancel the project sync");
                Ok(())
            }
            _ => Err(response.unexpected(CONTEXT).into()),
        }
    }
}
