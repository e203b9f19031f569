//! Semantic error types for the towerline library.
//!
//! This module defines the error hierarchy for towerline, following the
//! principle of using semantic error enums (via `thiserror`) for conditions
//! the caller might inspect or map to an exit status, while reserving opaque
//! errors (`eyre::Report`) for the application boundary.
//!
//! Every error can be reduced to an [`ErrorKind`] so front ends can branch on
//! the category of failure without matching individual variants.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Coarse classification of a failure, suitable for pattern matching by
/// callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing server definition, missing credentials, or an invalid
    /// template type. Never retried.
    Configuration,
    /// A name or identifier did not resolve to any item.
    NotFound,
    /// A name matched more than one item.
    NotUnique,
    /// Network failure or a status code with no more specific meaning.
    Transport,
    /// The Controller rejected the request body.
    Validation,
    /// The remote job could not be cancelled cleanly.
    Cancelled,
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// No server definition exists under the requested name.
    #[error("unable to find a Controller server named '{name}'")]
    UnknownServer {
        /// The server name that was requested.
        name: String,
    },

    /// The server definition references credentials that cannot be found.
    #[error("unable to find credentials '{id}' for server '{server}'")]
    UnknownCredentials {
        /// The server whose credentials were requested.
        server: String,
        /// The credentials identifier.
        id: String,
    },

    /// The template type is not one of `job`, `workflow` or `slice`.
    #[error("template type '{value}' was invalid, expected job, workflow or slice")]
    InvalidTemplateType {
        /// The rejected value.
        value: String,
    },

    /// An operation needed credentials but none were configured.
    #[error("Auth is required for this operation, configure a username and password or a token")]
    AuthRequired,

    /// The `OrthoConfig` library returned an error during configuration loading.
    ///
    /// This wraps errors from the layered configuration system, including:
    /// - Configuration file parsing errors
    /// - Environment variable parsing errors
    /// - CLI argument parsing errors
    /// - Missing required fields after layer merging
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while talking to the Controller REST API.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The request could not be sent or the response body could not be read.
    #[error("request {method} {url} failed: {message}")]
    Request {
        /// HTTP method of the failed request.
        method: String,
        /// Absolute URL of the failed request.
        url: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    ClientBuild {
        /// Description of the builder failure.
        message: String,
    },

    /// The Controller rejected the supplied username or password.
    #[error("Username/password invalid")]
    AuthenticationFailed,

    /// The Controller refused the request for the authenticated user.
    #[error("Request was forbidden: {detail}")]
    Forbidden {
        /// The `detail` field returned by the Controller, if any.
        detail: String,
    },

    /// The Controller answered with a status the caller did not expect.
    #[error("unexpected status {status} while {context}: {body}")]
    UnexpectedStatus {
        /// HTTP status code returned by the Controller.
        status: u16,
        /// What the client was attempting.
        context: String,
        /// Raw response body.
        body: String,
    },

    /// A directly addressed item does not exist.
    ///
    /// Raised by the numeric identifier fast path. Callers translate this into
    /// [`ControllerError::NotFound`] with a resource-specific message.
    #[error("item {reference} does not exist")]
    DoesNotExist {
        /// The identifier that was requested.
        reference: String,
    },

    /// A named item could not be found.
    #[error("{message}")]
    NotFound {
        /// Human-readable description naming the resource.
        message: String,
    },

    /// A name lookup matched more than one item.
    #[error("The item {reference} is not unique")]
    NotUnique {
        /// The name that was looked up.
        reference: String,
    },

    /// The Controller rejected the supplied extra variables.
    #[error("Extra vars are bad: {detail}")]
    ExtraVars {
        /// The server's complaint about the extra variables.
        detail: String,
    },

    /// The Controller rejected the request body.
    #[error("bad request (400)\n{body}")]
    BadRequest {
        /// Raw response body.
        body: String,
    },

    /// The Controller answered with a body missing an expected field.
    #[error("malformed response while {context}: {message}")]
    MalformedResponse {
        /// What the client was attempting.
        context: String,
        /// Which field or shape was wrong.
        message: String,
    },

    /// The project cannot be updated from source control.
    #[error("The requested project can not be synced, is it a manual project?")]
    ProjectNotSyncable,
}

/// Errors specific to the job lifecycle.
#[derive(Debug, Error)]
pub enum JobError {
    /// The Controller reported that the job cannot be cancelled.
    #[error("The job can not be canceled at this time")]
    NotCancellable,

    /// The Controller did not confirm cancellation within the attempt budget.
    #[error("Failed to cancel the job within the specified time limit")]
    CancelTimeout,
}

/// Top-level error type for the towerline library.
///
/// This enum aggregates all domain-specific errors into a single type that
/// can be used throughout the library. At the application boundary
/// (main.rs), these errors are converted to `eyre::Report` for
/// human-readable error reporting.
#[derive(Debug, Error)]
pub enum TowerlineError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while talking to the Controller.
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// An error occurred while managing a job.
    #[error(transparent)]
    Job(#[from] JobError),
}

impl TowerlineError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Controller(err) => err.kind(),
            Self::Job(_) => ErrorKind::Cancelled,
        }
    }
}

impl ControllerError {
    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DoesNotExist { .. } | Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotUnique { .. } => ErrorKind::NotUnique,
            Self::ExtraVars { .. } | Self::BadRequest { .. } => ErrorKind::Validation,
            Self::ProjectNotSyncable | Self::ClientBuild { .. } => ErrorKind::Configuration,
            Self::Request { .. }
            | Self::AuthenticationFailed
            | Self::Forbidden { .. }
            | Self::UnexpectedStatus { .. }
            | Self::MalformedResponse { .. } => ErrorKind::Transport,
        }
    }
}

/// A specialised `Result` type for towerline operations.
pub type Result<T> = std::result::Result<T, TowerlineError>;
