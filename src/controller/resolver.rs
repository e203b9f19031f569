//! Name-or-identifier lookup against Controller collections.

use serde_json::Value;
use tracing::debug;

use super::connection::ControllerConnection;
use crate::error::{ControllerError, Result, TowerlineError};

/// A Controller collection that items can be looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// `/job_templates/`
    JobTemplates,
    /// `/workflow_job_templates/`
    WorkflowJobTemplates,
    /// `/inventories/`
    Inventories,
    /// `/credentials/`
    Credentials,
    /// `/projects/`
    Projects,
}

impl Collection {
    /// API path of the collection, with leading and trailing slashes.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::JobTemplates => "/job_templates/",
            Self::WorkflowJobTemplates => "/workflow_job_templates/",
            Self::Inventories => "/inventories/",
            Self::Credentials => "/credentials/",
            Self::Projects => "/projects/",
        }
    }

    /// Singular noun used in messages.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::JobTemplates | Self::WorkflowJobTemplates => "template",
            Self::Inventories => "inventory",
            Self::Credentials => "credential",
            Self::Projects => "project",
        }
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Resolves `reference` in `collection`.
///
/// A reference that parses as an integer is fetched directly; anything else
/// is looked up with an exact `name` filter.
///
/// # Errors
///
/// - `ControllerError::DoesNotExist` when a numeric reference is missing
/// - `ControllerError::NotFound` when a name matches nothing
/// - `ControllerError::NotUnique` when a name matches more than one item
/// - `ControllerError::MalformedResponse` when the list has no `results`
pub async fn resolve(
    connection: &mut ControllerConnection,
    reference: &str,
    collection: Collection,
) -> Result<Value> {
    let endpoint = collection.endpoint();

    if reference.trim().parse::<u64>().is_ok() {
        let id = reference.trim();
        debug!(id, endpoint, "resolving by identifier");
        let item = connection
            .get_json(&format!("{endpoint}{id}/"), "loading an item by id")
            .await?;
        if item.get("id").is_none() {
            return Err(ControllerError::DoesNotExist {
                reference: reference.to_owned(),
            }
            .into());
        }
        return Ok(item);
    }

    debug!(name = reference, endpoint, "resolving by name");
    let context = format!("looking up {reference}");
    let listing = connection
        .get_json(&format!("{endpoint}?name={}", encode(reference)), &context)
        .await?;
    let results = listing
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| ControllerError::MalformedResponse {
            context: context.clone(),
            message: String::from("missing 'results'"),
        })?;
    let count = listing
        .get("count")
        .and_then(Value::as_u64)
        .unwrap_or_else(|| u64::try_from(results.len()).unwrap_or(u64::MAX));

    match (count, results.first()) {
        (0, _) | (_, None) => Err(ControllerError::NotFound {
            message: format!("Unable to get any results when looking up {reference}"),
        }
        .into()),
        (1, Some(item)) => Ok(item.clone()),
        _ => Err(ControllerError::NotUnique {
            reference: reference.to_owned(),
        }
        .into()),
    }
}

/// Rewrites a lookup failure into a resource-specific message.
///
/// `DoesNotExist` becomes `"<Label> <reference> does not exist"` and a failed
/// name lookup becomes `"Unable to find <label>: <detail>"`. Other errors keep
/// their kind.
pub(crate) fn describe_lookup_failure(
    error: TowerlineError,
    label: &str,
    reference: &str,
) -> TowerlineError {
    match error {
        TowerlineError::Controller(ControllerError::DoesNotExist { .. }) => {
            ControllerError::NotFound {
                message: format!("{} {reference} does not exist", capitalise(label)),
            }
            .into()
        }
        TowerlineError::Controller(ControllerError::NotFound { message }) => {
            ControllerError::NotFound {
                message: format!("Unable to find {label}: {message}"),
            }
            .into()
        }
        other => other,
    }
}

fn capitalise(label: &str) -> String {
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Resolves `reference` and reports failures in terms of `collection`.
///
/// # Errors
///
/// As [`resolve`], with not-found messages naming the resource.
pub async fn lookup(
    connection: &mut ControllerConnection,
    reference: &str,
    collection: Collection,
) -> Result<Value> {
    resolve(connection, reference, collection)
        .await
        .map_err(|error| describe_lookup_failure(error, collection.noun(), reference))
}

/// Extracts the numeric `id` of a resolved item.
pub(crate) fn item_id(item: &Value, context: &str) -> Result<u64> {
    item.get("id").and_then(Value::as_u64).ok_or_else(|| {
        ControllerError::MalformedResponse {
            context: context.to_owned(),
            message: String::from("missing 'id'"),
        }
        .into()
    })
}
