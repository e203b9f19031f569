//! Launch and follow automation Controller jobs from a build pipeline.
//!
//! `towerline` drives an Ansible Tower / AWX style Controller over its REST
//! API. A pipeline step names a template or project; towerline resolves it,
//! launches the job or source control sync, streams the output while it
//! runs, and hands back identifiers, the final result, and any variables the
//! job exported with `JENKINS_EXPORT` markers.
//!
//! # Architecture
//!
//! Each operation owns one [`controller::ControllerConnection`]. The
//! connection negotiates an authorization header lazily and releases any
//! server-issued token before the operation returns, whether it succeeded or
//! not. Polling is sequential and interruptible through a
//! `tokio_util::sync::CancellationToken`.
//!
//! # Modules
//!
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`controller`]: REST client, lookups, launches, log retrieval and projects
//! - [`error`]: Semantic error types for the application
//! - [`secrets`]: Credential lookup by identifier
//! - [`session`]: Pipeline-facing operations returning result bags

pub mod config;
pub mod controller;
pub mod error;
pub mod secrets;
pub mod session;
