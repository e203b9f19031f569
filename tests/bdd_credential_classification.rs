//! Behavioural tests for launch credential classification.
//!
//! These tests resolve credentials against a mock Controller and check which
//! launch body fields are produced for old and current server versions.

mod bdd_credential_classification_helpers;

pub use bdd_credential_classification_helpers::{
    CredentialClassificationState, credential_classification_state,
};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/credential_classification.feature",
    name = "Current servers receive one merged credential list"
)]
fn current_servers_receive_merged_list(
    credential_classification_state: CredentialClassificationState,
) {
    let _ = credential_classification_state;
}

#[scenario(
    path = "tests/features/credential_classification.feature",
    name = "Older servers receive separate credential fields"
)]
fn older_servers_receive_separate_fields(
    credential_classification_state: CredentialClassificationState,
) {
    let _ = credential_classification_state;
}

#[scenario(
    path = "tests/features/credential_classification.feature",
    name = "Older servers fall back to a merged list for two machine credentials"
)]
fn older_servers_merge_duplicate_machine_credentials(
    credential_classification_state: CredentialClassificationState,
) {
    let _ = credential_classification_state;
}

#[scenario(
    path = "tests/features/credential_classification.feature",
    name = "An unknown credential stops classification"
)]
fn unknown_credential_stops_classification(
    credential_classification_state: CredentialClassificationState,
) {
    let _ = credential_classification_state;
}
