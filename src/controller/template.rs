//! Template lookup and job launch.

use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::connection::ControllerConnection;
use super::credentials::classify;
use super::resolver::{Collection, describe_lookup_failure, item_id, lookup, resolve};
use crate::error::{ConfigError, ControllerError, Result};

/// The kind of template a job is launched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// A job template producing a single job.
    Job,
    /// A workflow job template.
    Workflow,
    /// A sliced job template; the launched job is tracked as a workflow.
    Slice,
}

impl TemplateKind {
    /// Collection the template itself lives in.
    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            Self::Job | Self::Slice => Collection::JobTemplates,
            Self::Workflow => Collection::WorkflowJobTemplates,
        }
    }

    /// Whether launched jobs are followed through `/workflow_jobs/`.
    #[must_use]
    pub const fn runs_as_workflow(self) -> bool {
        matches!(self, Self::Workflow | Self::Slice)
    }

    /// Collection the launched job is read from.
    #[must_use]
    pub const fn jobs_endpoint(self) -> &'static str {
        if self.runs_as_workflow() {
            "/workflow_jobs/"
        } else {
            "/jobs/"
        }
    }

    /// Segment of the web UI link for a launched job.
    #[must_use]
    pub const fn url_fragment(self) -> &'static str {
        if self.runs_as_workflow() {
            "workflows"
        } else {
            "jobs"
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Job => "job",
            Self::Workflow => "workflow",
            Self::Slice => "slice",
        })
    }
}

impl FromStr for TemplateKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" => Ok(Self::Job),
            "workflow" => Ok(Self::Workflow),
            "slice" => Ok(Self::Slice),
            _ => Err(ConfigError::InvalidTemplateType {
                value: s.to_owned(),
            }),
        }
    }
}

/// Optional launch-time overrides.
///
/// Unset and empty fields are never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    /// Extra variables as YAML or JSON text.
    pub extra_vars: Option<String>,
    /// Host limit pattern.
    pub limit: Option<String>,
    /// Comma-separated tags to run.
    pub job_tags: Option<String>,
    /// Comma-separated tags to skip.
    pub skip_tags: Option<String>,
    /// `run` or `check`.
    pub job_type: Option<String>,
    /// Inventory name or identifier.
    pub inventory: Option<String>,
    /// Comma-separated credential names or identifiers.
    pub credential: Option<String>,
    /// Source control branch override.
    pub scm_branch: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl LaunchParams {
    /// Returns a copy with empty strings turned into `None`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            extra_vars: non_empty(self.extra_vars),
            limit: non_empty(self.limit),
            job_tags: non_empty(self.job_tags),
            skip_tags: non_empty(self.skip_tags),
            job_type: non_empty(self.job_type),
            inventory: non_empty(self.inventory),
            credential: non_empty(self.credential),
            scm_branch: non_empty(self.scm_branch),
        }
    }

    /// Warnings for supplied fields the template will not prompt for.
    ///
    /// A field only warns when the template carries the matching
    /// `ask_*_on_launch` flag set to `false`.
    #[must_use]
    pub fn prompt_warnings(&self, template: &Value) -> Vec<String> {
        let checks: [(&Option<String>, &str, &str, &str); 7] = [
            (&self.job_type, "ask_job_type_on_launch", "Job type", "job type"),
            (&self.extra_vars, "ask_variables_on_launch", "Extra variables", "variables"),
            (&self.limit, "ask_limit_on_launch", "Limit", "limit"),
            (&self.job_tags, "ask_tags_on_launch", "Job Tags", "tags"),
            (&self.skip_tags, "ask_skip_tags_on_launch", "Skip Job Tags", "tags"),
            (&self.inventory, "ask_inventory_on_launch", "Inventory", "inventory"),
            (&self.credential, "ask_credential_on_launch", "Credential", "credential"),
        ];

        checks
            .into_iter()
            .filter(|(value, flag, _, _)| {
                value.is_some() && template.get(*flag).and_then(Value::as_bool) == Some(false)
            })
            .map(|(_, _, field, prompt)| {
                format!(
                    "[WARNING]: {field} defined but prompt for {prompt} on launch is not set in tower job"
                )
            })
            .collect()
    }
}

/// Loads the template identified by `reference`.
///
/// # Errors
///
/// Returns `ControllerError::NotFound` naming the template kind when the
/// template does not resolve, or `ControllerError::NotUnique` when a name is
/// ambiguous.
pub async fn find_template(
    connection: &mut ControllerConnection,
    kind: TemplateKind,
    reference: &str,
) -> Result<Value> {
    resolve(connection, reference, kind.collection())
        .await
        .map_err(|error| describe_lookup_failure(error, &format!("{kind} template"), reference))
}

/// Builds the launch body from `params`, resolving inventory and credentials.
///
/// # Errors
///
/// Fails when the inventory or any credential does not resolve.
pub async fn launch_body(
    connection: &mut ControllerConnection,
    params: &LaunchParams,
) -> Result<Map<String, Value>> {
    let mut body = Map::new();

    if let Some(reference) = params.inventory.as_deref() {
        let inventory = lookup(connection, reference, Collection::Inventories).await?;
        body.insert(
            String::from("inventory"),
            json!(item_id(&inventory, "resolving an inventory")?),
        );
    }

    if let Some(references) = params.credential.as_deref() {
        let classified = classify(connection, references).await?;
        body.extend(classified.into_body_fields(connection.version()));
    }

    let plain = [
        ("limit", &params.limit),
        ("job_tags", &params.job_tags),
        ("skip_tags", &params.skip_tags),
        ("job_type", &params.job_type),
        ("extra_vars", &params.extra_vars),
        ("scm_branch", &params.scm_branch),
    ];
    for (key, value) in plain {
        if let Some(text) = value {
            body.insert(key.to_owned(), Value::String(text.clone()));
        }
    }

    Ok(body)
}

/// Launches template `template_id` and returns the new job's identifier.
///
/// # Errors
///
/// - `ControllerError::ExtraVars` when the server rejects the extra variables
/// - `ControllerError::BadRequest` for any other `400`
/// - `ControllerError::MalformedResponse` when a `201` carries no `id`
/// - `ControllerError::UnexpectedStatus` for any other status
pub async fn launch(
    connection: &mut ControllerConnection,
    kind: TemplateKind,
    template_id: u64,
    body: &Map<String, Value>,
) -> Result<u64> {
    const CONTEXT: &str = "launching a template";

    let path = format!("{}{template_id}/launch/", kind.collection().endpoint());
    debug!(%path, fields = ?body.keys().collect::<Vec<_>>(), "launching template");
    let payload = Value::Object(body.clone());
    let response = connection.request(Method::POST, &path, Some(&payload)).await?;

    match response.status {
        201 => {
            let data = response.json(CONTEXT)?;
            let id = item_id(&data, CONTEXT)?;
            info!(job_id = id, %kind, "launched template");
            Ok(id)
        }
        400 => {
            let rejected = serde_json::from_str::<Value>(&response.body)
                .ok()
                .and_then(|data| data.get("extra_vars").cloned());
            Err(match rejected {
                Some(detail) => ControllerError::ExtraVars {
                    detail: detail.to_string(),
                },
                None => ControllerError::BadRequest {
                    body: response.body,
                },
            }
            .into())
        }
        _ => Err(response.unexpected(CONTEXT).into()),
    }
}
