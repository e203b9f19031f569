//! Launching a template and following the resulting job.

use serde_json::Value;
use tracing::{debug, info};

use super::follow::{JobFollower, PollPlan, follow};
use super::{
    ControllerSession, FollowOptions, LogSink, OperationReport, OperationStatus, ResultBag,
    VariableExpander,
};
use crate::controller::{
    ControllerJob, LaunchParams, LogFetcher, LogProcessor, TemplateKind, find_template, launch,
    launch_body,
};
use crate::error::{ControllerError, Result};

/// Everything needed to launch one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Template name or identifier.
    pub template: String,
    /// `job`, `workflow` or `slice`, matched case-insensitively.
    pub template_type: String,
    /// Launch-time overrides.
    pub params: LaunchParams,
    /// How the launched job is followed.
    pub follow: FollowOptions,
}

impl<S: LogSink, X: VariableExpander> ControllerSession<S, X> {
    fn expand_params(&self, params: &LaunchParams) -> LaunchParams {
        LaunchParams {
            extra_vars: self.expand_opt(params.extra_vars.as_deref()),
            limit: self.expand_opt(params.limit.as_deref()),
            job_tags: self.expand_opt(params.job_tags.as_deref()),
            skip_tags: self.expand_opt(params.skip_tags.as_deref()),
            job_type: self.expand_opt(params.job_type.as_deref()),
            inventory: self.expand_opt(params.inventory.as_deref()),
            credential: self.expand_opt(params.credential.as_deref()),
            scm_branch: self.expand_opt(params.scm_branch.as_deref()),
        }
        .normalized()
    }

    /// Launches a template and, unless detached, follows the job to the end.
    ///
    /// The report carries `JOB_ID` and `JOB_URL`; a followed job adds
    /// `JOB_RESULT` (`SUCCESS` or `FAILED`) and every exported variable.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidTemplateType` for an unknown template type
    /// - lookup errors for the template, inventory or credentials
    /// - `ControllerError::ExtraVars` / `ControllerError::BadRequest` when the
    ///   launch is rejected
    /// - `JobError` variants when cancellation cannot be completed
    pub async fn run_template(&mut self, request: &RunRequest) -> Result<OperationReport> {
        let outcome = self.run_template_inner(request).await;
        self.connection.release().await;
        outcome
    }

    async fn run_template_inner(&mut self, request: &RunRequest) -> Result<OperationReport> {
        let kind: TemplateKind = self.expand(&request.template_type).parse()?;
        let template_ref = self.expand(&request.template);
        let params = self.expand_params(&request.params);

        let template = find_template(&mut self.connection, kind, &template_ref).await?;
        let template_id = template
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ControllerError::MalformedResponse {
                context: String::from("loading a template"),
                message: String::from("missing 'id'"),
            })?;
        let warnings = params.prompt_warnings(&template);
        if !warnings.is_empty() {
            debug!(template = %template_ref, count = warnings.len(), "launch fields will be ignored");
        }
        self.emit(&warnings);

        let body = launch_body(&mut self.connection, &params).await?;
        let job = ControllerJob::new(
            launch(&mut self.connection, kind, template_id, &body).await?,
            kind,
        );
        let url = job.url(self.connection.base_url());
        self.emit(&[format!("Template Job URL: {url}")]);

        let mut results = ResultBag::default();
        results.insert("JOB_ID", job.id().to_string());
        results.insert("JOB_URL", url);

        if request.follow.detach {
            info!(job_id = job.id(), "not following launched job");
            return Ok(OperationReport {
                status: OperationStatus::Launched,
                results,
            });
        }

        let options = request.follow;
        let mut follower = JobFollower {
            job,
            fetcher: LogFetcher::new(
                LogProcessor::new(options.remove_color),
                options.full_logs,
                options.workflow_child_logs,
            ),
        };
        let plan = PollPlan {
            interval: self.polling.interval(),
            cancel_settings: self.cancel_settings(),
            token: &self.cancel,
            import_logs: options.import_logs,
        };
        let sink = &mut self.sink;
        let status = follow(&mut self.connection, &mut follower, &plan, |lines| {
            if !lines.is_empty() {
                sink.emit(lines);
            }
        })
        .await?;

        match status {
            OperationStatus::Success => results.insert("JOB_RESULT", "SUCCESS"),
            OperationStatus::Failed => results.insert("JOB_RESULT", "FAILED"),
            OperationStatus::Cancelled | OperationStatus::Launched => {}
        }
        results.extend(follower.fetcher.into_processor().into_exports());
        info!(job_id = job.id(), ?status, "template job finished");

        Ok(OperationReport { status, results })
    }
}
