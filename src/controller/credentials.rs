//! Sorting launch credentials into the fields a Controller version accepts.

use serde_json::{Map, Value, json};
use tracing::debug;

use super::connection::ControllerConnection;
use super::resolver::{Collection, item_id, lookup};
use super::version::ControllerVersion;
use crate::error::{ControllerError, Result};

const CREDENTIAL_TYPES_PATH: &str = "/credential_types/?or__kind=ssh&or__kind=vault";

/// Identifiers of the machine and vault credential types on one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CredentialTypes {
    machine: u64,
    vault: u64,
}

async fn credential_types(connection: &mut ControllerConnection) -> Result<CredentialTypes> {
    const CONTEXT: &str = "loading credential types";

    let listing = connection.get_json(CREDENTIAL_TYPES_PATH, CONTEXT).await?;
    let malformed = |message: &str| ControllerError::MalformedResponse {
        context: String::from(CONTEXT),
        message: message.to_owned(),
    };

    let count = listing.get("count").and_then(Value::as_u64);
    if count != Some(2) {
        return Err(malformed("expected exactly two credential types").into());
    }
    let results = listing
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'results'"))?;

    let mut machine = None;
    let mut vault = None;
    for entry in results {
        let id = entry.get("id").and_then(Value::as_u64);
        match entry.get("kind").and_then(Value::as_str) {
            Some("ssh") => machine = id,
            Some("vault") => vault = id,
            _ => {}
        }
    }

    match (machine, vault) {
        (Some(machine), Some(vault)) => Ok(CredentialTypes { machine, vault }),
        _ => Err(malformed("ssh or vault credential type missing").into()),
    }
}

/// Credential identifiers grouped by type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedCredentials {
    /// Machine (ssh) credentials.
    pub machine: Vec<u64>,
    /// Vault credentials.
    pub vault: Vec<u64>,
    /// Every other credential type.
    pub extra: Vec<u64>,
}

impl ClassifiedCredentials {
    /// Returns `true` when no credentials were classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machine.is_empty() && self.vault.is_empty() && self.extra.is_empty()
    }

    /// Launch body fields for a server reporting `version`.
    ///
    /// Servers from [`MERGED_CREDENTIALS_SINCE`](super::MERGED_CREDENTIALS_SINCE)
    /// onwards, servers of unknown version, and any request carrying more
    /// than one machine or vault credential use the single `credentials`
    /// array. Older servers get `credential`, `vault_credential` and
    /// `extra_credentials`, each only when populated.
    #[must_use]
    pub fn into_body_fields(self, version: Option<ControllerVersion>) -> Map<String, Value> {
        let mut fields = Map::new();
        let merged = version.is_none_or(ControllerVersion::accepts_merged_credentials)
            || self.machine.len() > 1
            || self.vault.len() > 1;

        if merged {
            let all: Vec<u64> = self
                .machine
                .into_iter()
                .chain(self.vault)
                .chain(self.extra)
                .collect();
            fields.insert(String::from("credentials"), json!(all));
            return fields;
        }

        if let Some(first) = self.machine.first() {
            fields.insert(String::from("credential"), json!(first));
        }
        if let Some(first) = self.vault.first() {
            fields.insert(String::from("vault_credential"), json!(first));
        }
        if !self.extra.is_empty() {
            fields.insert(String::from("extra_credentials"), json!(self.extra));
        }
        fields
    }
}

/// Resolves a comma-separated list of credential names or identifiers and
/// groups them by type.
///
/// Blank entries are ignored.
///
/// # Errors
///
/// Fails when the credential types cannot be loaded or any entry does not
/// resolve.
pub async fn classify(
    connection: &mut ControllerConnection,
    references: &str,
) -> Result<ClassifiedCredentials> {
    let types = credential_types(connection).await?;
    let mut classified = ClassifiedCredentials::default();

    for reference in references.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        let item = lookup(connection, reference, Collection::Credentials).await?;
        let id = item_id(&item, "resolving a credential")?;
        let credential_type = item.get("credential_type").and_then(Value::as_u64);
        debug!(reference, id, ?credential_type, "classified credential");

        match credential_type {
            Some(t) if t == types.machine => classified.machine.push(id),
            Some(t) if t == types.vault => classified.vault.push(id),
            _ => classified.extra.push(id),
        }
    }

    Ok(classified)
}
