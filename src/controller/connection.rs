//! Authenticated access to one Controller.

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::auth::{self, AuthState, ServerCredentials};
use super::transport::{ApiResponse, Transport};
use super::version::ControllerVersion;
use crate::error::{ControllerError, Result};

/// A connection to one Controller, owned by a single operation.
///
/// The authorization header is negotiated on the first authenticated request
/// and reused until [`release`](Self::release) is called. Requests take
/// `&mut self` so two operations can never share negotiated state.
#[derive(Debug)]
pub struct ControllerConnection {
    transport: Transport,
    credentials: Option<ServerCredentials>,
    auth: AuthState,
    version: Option<ControllerVersion>,
}

impl ControllerConnection {
    /// Creates a connection without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::ClientBuild` if the HTTP client cannot be
    /// constructed.
    pub fn new(
        base_url: &str,
        trust_cert: bool,
        credentials: Option<ServerCredentials>,
    ) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(base_url, trust_cert)?,
            credentials,
            auth: AuthState::default(),
            version: None,
        })
    }

    /// Creates a connection and reads the server version from `ping/`.
    ///
    /// A failed version probe is logged and leaves the version unknown.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::ClientBuild` if the HTTP client cannot be
    /// constructed.
    pub async fn open(
        base_url: &str,
        trust_cert: bool,
        credentials: Option<ServerCredentials>,
    ) -> Result<Self> {
        let mut connection = Self::new(base_url, trust_cert, credentials)?;
        connection.detect_version().await;
        Ok(connection)
    }

    /// Base URL of the Controller, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Version reported by the server, if it could be read.
    #[must_use]
    pub const fn version(&self) -> Option<ControllerVersion> {
        self.version
    }

    /// Whether a server-issued token is waiting to be released.
    #[must_use]
    pub const fn holds_issued_token(&self) -> bool {
        self.auth.issued_token_id.is_some()
    }

    async fn detect_version(&mut self) {
        match self.fetch_version().await {
            Ok(Some(version)) => {
                info!(%version, "detected Controller version");
                self.version = Some(version);
            }
            Ok(None) => debug!("Controller did not report a version"),
            Err(error) => warn!(%error, "unable to read Controller version"),
        }
    }

    async fn fetch_version(&self) -> Result<Option<ControllerVersion>> {
        const CONTEXT: &str = "reading the ping page";

        let response = self
            .transport
            .send(Method::GET, "ping/", None, None)
            .await?;
        if response.status != 200 {
            return Err(response.unexpected(CONTEXT).into());
        }
        let data = response.json(CONTEXT)?;
        let Some(raw) = data.get("version").and_then(Value::as_str) else {
            return Ok(None);
        };
        match raw.parse() {
            Ok(version) => Ok(Some(version)),
            Err(error) => {
                warn!(%error, "ignoring Controller version");
                Ok(None)
            }
        }
    }

    async fn authorization(&mut self) -> Result<String> {
        if let Some(header) = self.auth.header.as_ref() {
            return Ok(header.clone());
        }
        debug!("determining authorization header");
        self.auth = auth::negotiate(&self.transport, self.credentials.as_ref()).await?;
        self.auth.header.clone().ok_or_else(|| {
            ControllerError::MalformedResponse {
                context: String::from("negotiating authorization"),
                message: String::from("no authorization header was produced"),
            }
            .into()
        })
    }

    /// Sends an authenticated request.
    ///
    /// `401`, `403` and `404` are turned into errors. Every other status is
    /// returned for the caller to interpret.
    pub(crate) async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let authorization = self.authorization().await?;
        let response = self
            .transport
            .send(method, path, Some(&authorization), body)
            .await?;

        match response.status {
            401 => Err(ControllerError::AuthenticationFailed.into()),
            403 => {
                let detail = serde_json::from_str::<Value>(&response.body)
                    .ok()
                    .and_then(|data| data.get("detail").and_then(Value::as_str).map(str::to_owned))
                    .unwrap_or_else(|| String::from("no detail provided"));
                Err(ControllerError::Forbidden { detail }.into())
            }
            404 => Err(ControllerError::DoesNotExist {
                reference: path.to_owned(),
            }
            .into()),
            _ => Ok(response),
        }
    }

    /// Sends an authenticated `GET` that must answer `200` with JSON.
    pub(crate) async fn get_json(&mut self, path: &str, context: &str) -> Result<Value> {
        let response = self.request(Method::GET, path, None).await?;
        if response.status != 200 {
            return Err(response.unexpected(context).into());
        }
        Ok(response.json(context)?)
    }

    /// Releases any server-issued token and forgets the negotiated header.
    ///
    /// Never fails; problems are logged.
    pub async fn release(&mut self) {
        auth::release(&self.transport, self.credentials.as_ref(), &mut self.auth).await;
    }

    /// Verifies that the credentials grant access to the job list.
    ///
    /// The token is released whether or not the check succeeds.
    ///
    /// # Errors
    ///
    /// Returns the authentication, transport or status error raised by the
    /// check.
    pub async fn test_connection(&mut self) -> Result<()> {
        let outcome = self.get_json("jobs/", "testing authentication").await;
        self.release().await;
        outcome.map(|_| ())
    }
}
