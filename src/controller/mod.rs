//! Client for the automation Controller REST API.
//!
//! A [`ControllerConnection`] owns the HTTP client and the negotiated
//! authorization for one operation. The remaining modules build on it:
//!
//! - [`lookup`] turns names or identifiers into items
//! - [`classify`] sorts launch credentials by type
//! - [`find_template`], [`launch_body`] and [`launch`] start jobs
//! - [`ControllerJob`] and [`LogFetcher`] follow a running job
//! - [`Project`] and [`ProjectSync`] drive source control updates

mod auth;
mod connection;
mod credentials;
mod job;
mod log_fetch;
mod logs;
mod project;
mod resolver;
mod template;
#[cfg(test)]
mod test_support;
mod transport;
mod version;

pub use auth::ServerCredentials;
pub use connection::ControllerConnection;
pub use credentials::{ClassifiedCredentials, classify};
pub use job::{CancelSettings, ControllerJob};
pub use log_fetch::{LogFetcher, LogSource};
pub use logs::{EXPORT_MARKER, LogProcessor, parse_export, strip_color};
pub use project::{Project, ProjectSync};
pub use resolver::{Collection, lookup, resolve};
pub use template::{LaunchParams, TemplateKind, find_template, launch, launch_body};
pub use transport::{API_PREFIX, build_endpoint};
pub use version::{ControllerVersion, InvalidVersion, MERGED_CREDENTIALS_SINCE};
