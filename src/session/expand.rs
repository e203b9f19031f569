//! Environment variable expansion for operation inputs.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Expands references inside user-supplied values.
///
/// Unset inputs are never passed to the expander, so an absent value stays
/// absent.
#[cfg_attr(test, mockall::automock)]
pub trait VariableExpander {
    /// Expands `value`.
    fn expand(&self, value: &str) -> String;
}

#[expect(
    clippy::expect_used,
    reason = "the pattern is a constant and is covered by unit tests"
)]
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("constant reference pattern is valid")
});

/// Expands `$NAME` and `${NAME}` from the process environment.
///
/// References to unset variables are left untouched.
///
/// # Type Parameters
///
/// * `E` - An environment provider implementing the `mockable::Env` trait.
#[derive(Debug, Clone)]
pub struct EnvExpander<E: mockable::Env> {
    env: E,
}

impl<E: mockable::Env> EnvExpander<E> {
    /// Creates an expander reading from `env`.
    #[must_use]
    pub const fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: mockable::Env> VariableExpander for EnvExpander<E> {
    fn expand(&self, value: &str) -> String {
        REFERENCE
            .replace_all(value, |caps: &Captures<'_>| {
                let whole = caps.get(0).map_or("", |m| m.as_str());
                caps.get(1)
                    .or_else(|| caps.get(2))
                    .and_then(|name| self.env.string(name.as_str()))
                    .unwrap_or_else(|| whole.to_owned())
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use mockable::MockEnv;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn env() -> MockEnv {
        let mut env = MockEnv::new();
        env.expect_string().returning(|key| match key {
            "BUILD_NUMBER" => Some(String::from("42")),
            "BRANCH" => Some(String::from("main")),
            _ => None,
        });
        env
    }

    #[rstest]
    #[case("build-$BUILD_NUMBER", "build-42")]
    #[case("${BRANCH}-${BUILD_NUMBER}", "main-42")]
    #[case("$UNSET stays", "$UNSET stays")]
    #[case("no references", "no references")]
    #[case("cost: $5", "cost: $5")]
    fn expands_known_references(env: MockEnv, #[case] raw: &str, #[case] expected: &str) {
        let expander = EnvExpander::new(env);
        assert_eq!(expander.expand(raw), expected);
    }

    #[rstest]
    fn expansion_is_stable_once_resolved(env: MockEnv) {
        let expander = EnvExpander::new(env);
        let once = expander.expand("${BRANCH}");
        assert_eq!(expander.expand(&once), once);
    }
}
