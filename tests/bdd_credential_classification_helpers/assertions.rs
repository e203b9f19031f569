//! Then step definitions for credential classification BDD tests.

use rstest_bdd_macros::then;
use serde_json::{Map, Value};

use super::state::{ClassificationOutcome, CredentialClassificationState, StepResult};

fn fields(state: &CredentialClassificationState) -> StepResult<Map<String, Value>> {
    match state.outcome.get() {
        Some(ClassificationOutcome::Fields(fields)) => Ok(fields),
        Some(ClassificationOutcome::Failed { message }) => {
            Err(format!("expected classification to succeed, got: {message}"))
        }
        None => Err(String::from("outcome should be set")),
    }
}

fn ids(value: Option<&Value>) -> Vec<u64> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default()
}

#[then("the launch body lists {count} merged credentials")]
fn merged_credentials(
    credential_classification_state: &CredentialClassificationState,
    count: usize,
) -> StepResult<()> {
    let body = fields(credential_classification_state)?;
    let merged = ids(body.get("credentials"));
    if body.len() != 1 {
        return Err(format!("expected only the credentials field, got: {body:?}"));
    }
    if merged.len() == count {
        Ok(())
    } else {
        Err(format!("expected {count} merged credentials, got: {merged:?}"))
    }
}

#[then("the launch body uses credential {id}")]
fn single_machine_credential(
    credential_classification_state: &CredentialClassificationState,
    id: u64,
) -> StepResult<()> {
    let body = fields(credential_classification_state)?;
    match body.get("credential").and_then(Value::as_u64) {
        Some(found) if found == id => Ok(()),
        other => Err(format!("expected credential {id}, got: {other:?}")),
    }
}

#[then("the launch body uses vault credential {id}")]
fn single_vault_credential(
    credential_classification_state: &CredentialClassificationState,
    id: u64,
) -> StepResult<()> {
    let body = fields(credential_classification_state)?;
    match body.get("vault_credential").and_then(Value::as_u64) {
        Some(found) if found == id => Ok(()),
        other => Err(format!("expected vault credential {id}, got: {other:?}")),
    }
}

#[then("the launch body lists extra credential {id}")]
fn extra_credential(
    credential_classification_state: &CredentialClassificationState,
    id: u64,
) -> StepResult<()> {
    let body = fields(credential_classification_state)?;
    let extra = ids(body.get("extra_credentials"));
    if extra == [id] {
        Ok(())
    } else {
        Err(format!("expected extra credentials [{id}], got: {extra:?}"))
    }
}

#[then("classification fails mentioning {name}")]
fn classification_fails(
    credential_classification_state: &CredentialClassificationState,
    name: String,
) -> StepResult<()> {
    match credential_classification_state.outcome.get() {
        Some(ClassificationOutcome::Failed { message }) if message.contains(&name) => Ok(()),
        Some(ClassificationOutcome::Failed { message }) => {
            Err(format!("expected error to mention '{name}', got: {message}"))
        }
        Some(ClassificationOutcome::Fields(fields)) => {
            Err(format!("expected classification to fail, got: {fields:?}"))
        }
        None => Err(String::from("outcome should be set")),
    }
}
