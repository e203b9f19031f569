//! Incremental log retrieval for jobs, updates and workflow nodes.
//!
//! Every source keeps a watermark (the highest event or node identifier
//! already emitted) and only asks the Controller for items above it, so a
//! line is never emitted twice within one operation. A job can finish before
//! the server has indexed all of its events; the final fetch after
//! completion may therefore miss trailing output.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, trace};

use super::connection::ControllerConnection;
use super::logs::LogProcessor;
use crate::error::{ControllerError, Result};

/// Where a batch of log lines comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Events of a playbook job.
    Job(u64),
    /// `result_stdout` of a project update.
    ProjectUpdate(u64),
    /// `result_stdout` of an inventory update.
    InventoryUpdate(u64),
    /// Node summaries (and optionally child logs) of a workflow job.
    WorkflowNode(u64),
}

const TERMINAL_STATUSES: [&str; 4] = ["successful", "failed", "error", "canceled"];

fn with_watermark(path: &str, watermark: u64) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}id__gt={watermark}")
}

fn event_text(event: &Value, full_logs: bool) -> Option<String> {
    if full_logs {
        let message = event
            .get("event_data")
            .and_then(|data| data.get("res"))
            .and_then(|res| res.get("msg"))
            .filter(|msg| !msg.is_null());
        if let Some(msg) = message {
            return Some(msg.as_str().map_or_else(|| msg.to_string(), str::to_owned));
        }
    }
    event
        .get("stdout")
        .and_then(Value::as_str)
        // Empty stdout (play or task start markers) emits no blank line.
        .filter(|stdout| !stdout.is_empty())
        .map(str::to_owned)
}

fn malformed(context: &str, message: &str) -> ControllerError {
    ControllerError::MalformedResponse {
        context: context.to_owned(),
        message: message.to_owned(),
    }
}

/// Reads an event collection above `watermark`, following pagination.
///
/// Each further page is requested with the advanced watermark rather than
/// the server's `next` link, so a page boundary can never repeat an event.
pub(crate) async fn collect_events(
    connection: &mut ControllerConnection,
    events_path: &str,
    watermark: &mut u64,
    full_logs: bool,
    processor: &mut LogProcessor,
    lines: &mut Vec<String>,
) -> Result<()> {
    const CONTEXT: &str = "reading job events";

    loop {
        let start = *watermark;
        let page = connection
            .get_json(&with_watermark(events_path, start), CONTEXT)
            .await?;
        let events = page
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| malformed(CONTEXT, "missing 'results'"))?;

        // Page order is not id order.
        for event in events {
            let Some(id) = event.get("id").and_then(Value::as_u64) else {
                continue;
            };
            if id <= start {
                continue;
            }
            if let Some(text) = event_text(event, full_logs) {
                processor.push(&text, lines);
            }
            *watermark = (*watermark).max(id);
        }
        trace!(events_path, watermark = *watermark, "read event page");

        let has_next = page.get("next").is_some_and(|next| !next.is_null());
        if !has_next || *watermark == start {
            return Ok(());
        }
    }
}

async fn collect_stdout(
    connection: &mut ControllerConnection,
    path: &str,
    processor: &mut LogProcessor,
    lines: &mut Vec<String>,
) -> Result<()> {
    let update = connection.get_json(path, "reading update output").await?;
    if let Some(stdout) = update.get("result_stdout").and_then(Value::as_str) {
        processor.push(stdout, lines);
    }
    Ok(())
}

/// Log retrieval state for one operation.
#[derive(Debug, Clone, Default)]
pub struct LogFetcher {
    full_logs: bool,
    workflow_child_logs: bool,
    event_watermarks: BTreeMap<u64, u64>,
    node_watermarks: BTreeMap<u64, u64>,
    processor: LogProcessor,
}

impl LogFetcher {
    /// Creates a fetcher feeding `processor`.
    #[must_use]
    pub const fn new(processor: LogProcessor, full_logs: bool, workflow_child_logs: bool) -> Self {
        Self {
            full_logs,
            workflow_child_logs,
            event_watermarks: BTreeMap::new(),
            node_watermarks: BTreeMap::new(),
            processor,
        }
    }

    /// Highest event identifier emitted for job `job_id`.
    #[must_use]
    pub fn event_watermark(&self, job_id: u64) -> u64 {
        self.event_watermarks.get(&job_id).copied().unwrap_or_default()
    }

    /// Highest node identifier emitted for workflow job `workflow_id`.
    #[must_use]
    pub fn node_watermark(&self, workflow_id: u64) -> u64 {
        self.node_watermarks.get(&workflow_id).copied().unwrap_or_default()
    }

    /// The processor collecting exports.
    pub const fn processor_mut(&mut self) -> &mut LogProcessor {
        &mut self.processor
    }

    /// Consumes the fetcher, returning its processor.
    #[must_use]
    pub fn into_processor(self) -> LogProcessor {
        self.processor
    }

    /// Fetches the lines of `source` not yet emitted.
    ///
    /// # Errors
    ///
    /// Returns any transport or malformed-response error raised while
    /// reading.
    pub async fn fetch(
        &mut self,
        connection: &mut ControllerConnection,
        source: LogSource,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        match source {
            LogSource::Job(id) => self.job_events(connection, id, &mut lines).await?,
            LogSource::ProjectUpdate(id) => {
                collect_stdout(
                    connection,
                    &format!("/project_updates/{id}/"),
                    &mut self.processor,
                    &mut lines,
                )
                .await?;
            }
            LogSource::InventoryUpdate(id) => {
                collect_stdout(
                    connection,
                    &format!("/inventory_updates/{id}/"),
                    &mut self.processor,
                    &mut lines,
                )
                .await?;
            }
            LogSource::WorkflowNode(id) => {
                self.workflow_nodes(connection, id, &mut lines).await?;
            }
        }
        Ok(lines)
    }

    async fn job_events(
        &mut self,
        connection: &mut ControllerConnection,
        job_id: u64,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        let mut watermark = self.event_watermark(job_id);
        let outcome = collect_events(
            connection,
            &format!("/jobs/{job_id}/job_events/"),
            &mut watermark,
            self.full_logs,
            &mut self.processor,
            lines,
        )
        .await;
        self.event_watermarks.insert(job_id, watermark);
        outcome
    }

    /// Walks finished workflow nodes above the node watermark.
    ///
    /// Further pages are requested with the advanced watermark. Processing
    /// stops at the first node whose job has not finished, so later nodes
    /// are never reported ahead of it.
    async fn workflow_nodes(
        &mut self,
        connection: &mut ControllerConnection,
        workflow_id: u64,
        lines: &mut Vec<String>,
    ) -> Result<()> {
        const CONTEXT: &str = "reading workflow nodes";

        loop {
            let start = self.node_watermark(workflow_id);
            let path = with_watermark(
                &format!("/workflow_jobs/{workflow_id}/workflow_nodes/"),
                start,
            );
            let page = connection.get_json(&path, CONTEXT).await?;
            let nodes = page
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| malformed(CONTEXT, "missing 'results'"))?;

            if !self
                .workflow_page(connection, workflow_id, nodes, lines)
                .await?
            {
                return Ok(());
            }

            let has_next = page.get("next").is_some_and(|next| !next.is_null());
            if !has_next || self.node_watermark(workflow_id) == start {
                return Ok(());
            }
        }
    }

    /// Emits one page of nodes. Returns `false` when an unfinished node
    /// stopped processing.
    async fn workflow_page(
        &mut self,
        connection: &mut ControllerConnection,
        workflow_id: u64,
        nodes: &[Value],
        lines: &mut Vec<String>,
    ) -> Result<bool> {
        for node in nodes {
            let summary = node.get("summary_fields");
            let job = summary.and_then(|s| s.get("job"));
            let job_type = summary
                .and_then(|s| s.get("unified_job_template"))
                .and_then(|t| t.get("unified_job_type"))
                .and_then(Value::as_str);
            let (Some(job), Some(job_type)) = (job, job_type) else {
                continue;
            };

            let status = job.get("status").and_then(Value::as_str).unwrap_or_default();
            if !TERMINAL_STATUSES.contains(&status) {
                debug!(workflow_id, status, "workflow node still running");
                return Ok(false);
            }

            let node_id = node.get("id").and_then(Value::as_u64).unwrap_or_default();
            let watermark = self.node_watermarks.entry(workflow_id).or_default();
            *watermark = (*watermark).max(node_id);

            let child_id = job.get("id").and_then(Value::as_u64).unwrap_or_default();
            let name = job.get("name").and_then(Value::as_str).unwrap_or_default();
            self.processor.push(
                &format!(
                    "{name} => {status} {}/#/jobs/{child_id}",
                    connection.base_url()
                ),
                lines,
            );

            if self.workflow_child_logs {
                match job_type {
                    "job" => self.job_events(connection, child_id, lines).await?,
                    "project_update" => {
                        collect_stdout(
                            connection,
                            &format!("/project_updates/{child_id}/"),
                            &mut self.processor,
                            lines,
                        )
                        .await?;
                    }
                    "inventory_update" => {
                        collect_stdout(
                            connection,
                            &format!("/inventory_updates/{child_id}/"),
                            &mut self.processor,
                            lines,
                        )
                        .await?;
                    }
                    other => {
                        self.processor
                            .push(&format!("Unknown job type in workflow: {other}"), lines);
                    }
                }
            }
            lines.push(String::new());
            lines.push(String::new());
        }
        Ok(true)
    }
}
