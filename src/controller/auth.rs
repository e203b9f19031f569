//! Authorization header negotiation.
//!
//! Controllers differ in which authentication schemes they accept, so the
//! header is chosen by trying each scheme in turn:
//!
//! 1. a pre-issued bearer token, used as-is;
//! 2. a freshly issued OAuth token (`POST /api/v2/tokens/`), which must be
//!    released afterwards;
//! 3. a legacy token (`POST /api/v2/authtoken/`);
//! 4. HTTP basic authentication.
//!
//! Failures in steps 2 and 3 are logged and the next scheme is tried.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::transport::{ApiResponse, Transport};
use crate::error::{ConfigError, ControllerError, Result};

const OAUTH_PROBE: &str = "/api/o/";
const LEGACY_TOKEN_PROBE: &str = "/api/v2/authtoken";
const TOKEN_DESCRIPTION: &str = "towerline pipeline token";

/// Credential material for one Controller.
#[derive(Clone, PartialEq, Eq)]
pub enum ServerCredentials {
    /// An account used for token negotiation or basic auth.
    Password {
        /// Account name.
        username: String,
        /// Account password.
        password: String,
    },
    /// A pre-issued OAuth token.
    Token {
        /// The bearer secret.
        secret: String,
    },
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token { .. } => f
                .debug_struct("Token")
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Negotiated authorization for a connection.
#[derive(Debug, Default)]
pub(crate) struct AuthState {
    pub(crate) header: Option<String>,
    pub(crate) issued_token_id: Option<u64>,
}

pub(crate) fn basic_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

fn string_field<'a>(data: &'a Value, field: &str, context: &str) -> Result<&'a str> {
    data.get(field).and_then(Value::as_str).ok_or_else(|| {
        ControllerError::MalformedResponse {
            context: context.to_owned(),
            message: format!("missing '{field}'"),
        }
        .into()
    })
}

/// Picks an authorization header for `credentials`.
///
/// # Errors
///
/// Returns `ConfigError::AuthRequired` when no credentials are supplied.
/// Token negotiation failures never surface; basic auth is the final
/// fallback.
pub(crate) async fn negotiate(
    transport: &Transport,
    credentials: Option<&ServerCredentials>,
) -> Result<AuthState> {
    match credentials {
        None => Err(ConfigError::AuthRequired.into()),
        Some(ServerCredentials::Token { secret }) => {
            debug!("using pre-issued bearer token");
            Ok(AuthState {
                header: Some(format!("Bearer {secret}")),
                issued_token_id: None,
            })
        }
        Some(ServerCredentials::Password { username, password }) => {
            match request_oauth_token(transport, username, password).await {
                Ok(Some((id, token))) => {
                    info!(token_id = id, %username, "acquired OAuth token");
                    return Ok(AuthState {
                        header: Some(format!("Bearer {token}")),
                        issued_token_id: Some(id),
                    });
                }
                Ok(None) => debug!("Controller does not issue OAuth tokens"),
                Err(error) => warn!(%error, "unable to obtain an OAuth token"),
            }

            match request_legacy_token(transport, username, password).await {
                Ok(Some(token)) => {
                    info!(%username, "acquired legacy token");
                    return Ok(AuthState {
                        header: Some(format!("Token {token}")),
                        issued_token_id: None,
                    });
                }
                Ok(None) => debug!("Controller does not issue legacy tokens"),
                Err(error) => warn!(%error, "unable to obtain a legacy token"),
            }

            info!("falling back to basic authentication");
            Ok(AuthState {
                header: Some(basic_header(username, password)),
                issued_token_id: None,
            })
        }
    }
}

async fn request_oauth_token(
    transport: &Transport,
    username: &str,
    password: &str,
) -> Result<Option<(u64, String)>> {
    const CONTEXT: &str = "requesting an OAuth token";

    if !transport.supports(OAUTH_PROBE).await? {
        return Ok(None);
    }

    let body = json!({
        "description": TOKEN_DESCRIPTION,
        "application": null,
        "scope": "write",
    });
    let response = transport
        .send(
            Method::POST,
            "/tokens/",
            Some(&basic_header(username, password)),
            Some(&body),
        )
        .await?;

    match response.status {
        200 | 201 => {}
        400 | 401 => return Err(ControllerError::AuthenticationFailed.into()),
        403 => {
            return Err(ControllerError::Forbidden {
                detail: String::from("the Controller refuses to issue OAuth tokens"),
            }
            .into());
        }
        404 => return Ok(None),
        _ => return Err(response.unexpected(CONTEXT).into()),
    }

    let data = response.json(CONTEXT)?;
    let id = data
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ControllerError::MalformedResponse {
            context: CONTEXT.to_owned(),
            message: String::from("missing 'id'"),
        })?;
    let token = string_field(&data, "token", CONTEXT)?;
    Ok(Some((id, token.to_owned())))
}

async fn request_legacy_token(
    transport: &Transport,
    username: &str,
    password: &str,
) -> Result<Option<String>> {
    const CONTEXT: &str = "requesting a legacy token";

    if !transport.supports(LEGACY_TOKEN_PROBE).await? {
        return Ok(None);
    }

    let body = json!({ "username": username, "password": password });
    let response: ApiResponse = transport
        .send(Method::POST, "/authtoken/", None, Some(&body))
        .await?;
    match response.status {
        200 | 201 => {
            let data = response.json(CONTEXT)?;
            Ok(Some(string_field(&data, "token", CONTEXT)?.to_owned()))
        }
        400 | 401 => Err(ControllerError::AuthenticationFailed.into()),
        _ => Err(response.unexpected(CONTEXT).into()),
    }
}

/// Deletes an issued OAuth token and clears the negotiated header.
///
/// Does nothing when no token was issued. Failures are logged and the state
/// is cleared regardless.
pub(crate) async fn release(
    transport: &Transport,
    credentials: Option<&ServerCredentials>,
    state: &mut AuthState,
) {
    let Some(token_id) = state.issued_token_id.take() else {
        return;
    };
    state.header = None;

    let Some(ServerCredentials::Password { username, password }) = credentials else {
        warn!(token_id, "cannot release token without the issuing account");
        return;
    };

    let path = format!("/tokens/{token_id}/");
    match transport
        .send(
            Method::DELETE,
            &path,
            Some(&basic_header(username, password)),
            None,
        )
        .await
    {
        Ok(response) if response.status == 204 => info!(token_id, "released OAuth token"),
        Ok(response) if response.status == 400 => {
            warn!(token_id, "unable to delete OAuth token: invalid authorization");
        }
        Ok(response) => warn!(
            token_id,
            status = response.status,
            "unexpected status deleting OAuth token"
        ),
        Err(error) => warn!(token_id, %error, "failed to delete OAuth token"),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::{ErrorKind, TowerlineError};

    fn password() -> ServerCredentials {
        ServerCredentials::Password {
            username: String::from("admin"),
            password: String::from("secret"),
        }
    }

    async fn probe(server: &MockServer, probe_path: &str, status: u16) {
        Mock::given(method("HEAD"))
            .and(path(probe_path))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[rstest]
    fn basic_header_encodes_user_and_password() {
        assert_eq!(basic_header("admin", "secret"), "Basic YWRtaW46c2VjcmV0");
    }

    #[rstest]
    fn debug_output_never_shows_secrets() {
        let rendered = format!(
            "{:?} {:?}",
            password(),
            ServerCredentials::Token {
                secret: String::from("tok-123")
            }
        );
        assert!(!rendered.contains("\"secret\""));
        assert!(!rendered.contains("tok-123"));
        assert!(rendered.contains("admin"));
    }

    #[tokio::test]
    async fn missing_credentials_is_a_configuration_error() {
        let transport = Transport::new("http://127.0.0.1:9", false).expect("client should build");
        let error = negotiate(&transport, None)
            .await
            .expect_err("negotiation should fail");
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn bearer_secret_needs_no_network() {
        let transport = Transport::new("http://127.0.0.1:9", false).expect("client should build");
        let creds = ServerCredentials::Token {
            secret: String::from("abc"),
        };
        let state = negotiate(&transport, Some(&creds))
            .await
            .expect("negotiation should succeed");
        assert_eq!(state.header.as_deref(), Some("Bearer abc"));
        assert!(state.issued_token_id.is_none());
    }

    #[tokio::test]
    async fn oauth_token_is_issued_and_remembered() {
        let server = MockServer::start().await;
        probe(&server, "/api/o/", 200).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/tokens/"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .and(body_json(json!({
                "description": TOKEN_DESCRIPTION,
                "application": null,
                "scope": "write",
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"id": 44, "token": "oauth-tok"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let state = negotiate(&transport, Some(&password()))
            .await
            .expect("negotiation should succeed");
        assert_eq!(state.header.as_deref(), Some("Bearer oauth-tok"));
        assert_eq!(state.issued_token_id, Some(44));
    }

    #[tokio::test]
    async fn refused_oauth_falls_back_to_legacy_token() {
        let server = MockServer::start().await;
        probe(&server, "/api/o/", 200).await;
        probe(&server, "/api/v2/authtoken", 200).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/tokens/"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/authtoken/"))
            .and(body_json(json!({"username": "admin", "password": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "legacy"})))
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let state = negotiate(&transport, Some(&password()))
            .await
            .expect("negotiation should succeed");
        assert_eq!(state.header.as_deref(), Some("Token legacy"));
        assert!(state.issued_token_id.is_none());
    }

    #[tokio::test]
    async fn no_token_endpoints_means_basic_auth() {
        let server = MockServer::start().await;
        probe(&server, "/api/o/", 404).await;
        probe(&server, "/api/v2/authtoken", 404).await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let state = negotiate(&transport, Some(&password()))
            .await
            .expect("negotiation should succeed");
        assert_eq!(state.header.as_deref(), Some("Basic YWRtaW46c2VjcmV0"));
    }

    #[tokio::test]
    async fn invalid_password_on_token_request_is_reported() {
        let server = MockServer::start().await;
        probe(&server, "/api/o/", 200).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/tokens/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let error = request_oauth_token(&transport, "admin", "wrong")
            .await
            .expect_err("token request should fail");
        assert!(matches!(
            error,
            TowerlineError::Controller(ControllerError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn release_deletes_issued_token_and_clears_state_even_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v2/tokens/44/"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let mut state = AuthState {
            header: Some(String::from("Bearer oauth-tok")),
            issued_token_id: Some(44),
        };
        release(&transport, Some(&password()), &mut state).await;
        assert!(state.header.is_none());
        assert!(state.issued_token_id.is_none());
    }

    #[tokio::test]
    async fn release_without_issued_token_is_a_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let mut state = AuthState {
            header: Some(String::from("Bearer abc")),
            issued_token_id: None,
        };
        release(&transport, Some(&password()), &mut state).await;
        assert_eq!(state.header.as_deref(), Some("Bearer abc"));
    }
}
