//! Credential lookup for Controller servers.
//!
//! Operations never read passwords or tokens directly. They ask a
//! [`CredentialProvider`] for the material stored under an identifier, which
//! keeps secret storage swappable and lets tests inject fixed credentials.

use std::collections::BTreeMap;

use crate::config::CredentialEntry;
use crate::controller::ServerCredentials;

/// Source of credential material keyed by identifier.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider {
    /// Returns the credentials stored under `id`, if any.
    fn lookup(&self, id: &str) -> Option<ServerCredentials>;
}

/// Reads credentials from the `[credentials.<id>]` tables of the
/// configuration.
///
/// An entry with a `secret` yields a bearer token even when a username and
/// password are also present. An entry with neither a secret nor a complete
/// username and password is treated as missing.
#[derive(Debug, Clone, Copy)]
pub struct ConfigCredentialProvider<'a> {
    entries: &'a BTreeMap<String, CredentialEntry>,
}

impl<'a> ConfigCredentialProvider<'a> {
    /// Creates a provider over the configured credential tables.
    #[must_use]
    pub const fn new(entries: &'a BTreeMap<String, CredentialEntry>) -> Self {
        Self { entries }
    }
}

impl CredentialProvider for ConfigCredentialProvider<'_> {
    fn lookup(&self, id: &str) -> Option<ServerCredentials> {
        let entry = self.entries.get(id)?;
        if let Some(secret) = entry.secret.as_ref().filter(|s| !s.is_empty()) {
            return Some(ServerCredentials::Token {
                secret: secret.clone(),
            });
        }
        match (&entry.username, &entry.password) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(ServerCredentials::Password {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => None,
        }
    }
}
