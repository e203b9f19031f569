//! Given and When step definitions for credential classification BDD tests.

use rstest_bdd_macros::{given, when};
use serde_json::json;
use towerline::controller::{ControllerConnection, ServerCredentials, classify};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::state::{
    ClassificationOutcome, CredentialClassificationState, KnownCredential, StepResult,
};

const MACHINE_TYPE: u64 = 1;
const VAULT_TYPE: u64 = 3;
const CLOUD_TYPE: u64 = 5;

/// Identifier the mock server assigns to the credential at `index`.
fn credential_id(index: usize) -> u64 {
    100 + u64::try_from(index).unwrap_or_default()
}

fn register(state: &CredentialClassificationState, name: String, credential_type: u64) {
    let mut known = state.known.get().unwrap_or_default();
    known.push(KnownCredential {
        name,
        credential_type,
    });
    state.known.set(known);
}

async fn mock_controller(version: &str, known: &[KnownCredential]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/ping/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": version})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/credential_types/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "results": [
                {"id": MACHINE_TYPE, "kind": "ssh"},
                {"id": VAULT_TYPE, "kind": "vault"}
            ]
        })))
        .mount(&server)
        .await;

    for (index, credential) in known.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/api/v2/credentials/"))
            .and(query_param("name", credential.name.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "results": [{
                    "id": credential_id(index),
                    "name": credential.name,
                    "credential_type": credential.credential_type
                }]
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/v2/credentials/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"count": 0, "results": []})),
        )
        .mount(&server)
        .await;
    server
}

async fn run_classification(
    version: &str,
    known: &[KnownCredential],
    references: &str,
) -> StepResult<ClassificationOutcome> {
    let server = mock_controller(version, known).await;
    let mut connection = ControllerConnection::open(
        &server.uri(),
        false,
        Some(ServerCredentials::Token {
            secret: String::from("bdd-token"),
        }),
    )
    .await
    .map_err(|e| format!("connection should open: {e}"))?;

    Ok(match classify(&mut connection, references).await {
        Ok(classified) => {
            ClassificationOutcome::Fields(classified.into_body_fields(connection.version()))
        }
        Err(error) => ClassificationOutcome::Failed {
            message: error.to_string(),
        },
    })
}

#[given("a Controller reporting version {version}")]
fn controller_version(
    credential_classification_state: &CredentialClassificationState,
    version: String,
) {
    credential_classification_state.version.set(version);
}

#[given("a machine credential named {name}")]
fn machine_credential(
    credential_classification_state: &CredentialClassificationState,
    name: String,
) {
    register(credential_classification_state, name, MACHINE_TYPE);
}

#[given("a vault credential named {name}")]
fn vault_credential(
    credential_classification_state: &CredentialClassificationState,
    name: String,
) {
    register(credential_classification_state, name, VAULT_TYPE);
}

#[given("a cloud credential named {name}")]
fn cloud_credential(
    credential_classification_state: &CredentialClassificationState,
    name: String,
) {
    register(credential_classification_state, name, CLOUD_TYPE);
}

#[when("the credentials {references} are classified")]
fn credentials_are_classified(
    credential_classification_state: &CredentialClassificationState,
    references: String,
) -> StepResult<()> {
    let version = credential_classification_state
        .version
        .get()
        .ok_or_else(|| String::from("version should be set"))?;
    let known = credential_classification_state.known.get().unwrap_or_default();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("failed to create tokio runtime: {e}"))?;
    let outcome = rt.block_on(run_classification(&version, &known, &references))?;
    credential_classification_state.outcome.set(outcome);
    Ok(())
}
