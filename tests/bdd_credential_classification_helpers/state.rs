//! Scenario state for launch credential classification BDD tests.

use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use serde_json::{Map, Value};

/// Convenience alias for step outcomes.
pub type StepResult<T> = Result<T, String>;

/// A credential the mock Controller knows about.
#[derive(Clone, Debug)]
pub struct KnownCredential {
    /// Name used in lookups.
    pub name: String,
    /// Credential type identifier on the server.
    pub credential_type: u64,
}

/// Outcome of a classification attempt.
#[derive(Clone, Debug)]
pub enum ClassificationOutcome {
    /// Launch body fields produced for the server version.
    Fields(Map<String, Value>),
    /// Classification failed with the given message.
    Failed {
        /// The `Display` representation of the error.
        message: String,
    },
}

/// State shared across credential classification scenarios.
#[derive(Default, ScenarioState)]
pub struct CredentialClassificationState {
    /// Version string reported by `ping/`.
    pub(crate) version: Slot<String>,
    /// Credentials registered on the mock server, in declaration order.
    pub(crate) known: Slot<Vec<KnownCredential>>,
    /// Outcome of the most recent classification.
    pub(crate) outcome: Slot<ClassificationOutcome>,
}

/// Fixture providing fresh state for each scenario.
#[rstest::fixture]
pub fn credential_classification_state() -> CredentialClassificationState {
    CredentialClassificationState::default()
}
