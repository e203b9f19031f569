//! Behavioural step helpers for launch credential classification scenarios.

mod assertions;
mod state;
mod steps;

pub use state::{CredentialClassificationState, credential_classification_state};
