//! HTTP plumbing shared by every Controller call.

use reqwest::{Client, Method, StatusCode, header};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ControllerError;

/// Prefix prepended to relative API paths.
pub const API_PREFIX: &str = "/api/v2";

/// Expands a path into an absolute API path.
///
/// Paths already rooted at `/api/` are returned unchanged. Anything else is
/// placed under [`API_PREFIX`], inserting the separating `/` when missing.
///
/// ```
/// use towerline::controller::build_endpoint;
///
/// assert_eq!(build_endpoint("jobs/"), "/api/v2/jobs/");
/// assert_eq!(build_endpoint("/ping/"), "/api/v2/ping/");
/// assert_eq!(build_endpoint("/api/o/"), "/api/o/");
/// ```
#[must_use]
pub fn build_endpoint(path: &str) -> String {
    if path.starts_with("/api/") {
        path.to_owned()
    } else if path.starts_with('/') {
        format!("{API_PREFIX}{path}")
    } else {
        format!("{API_PREFIX}/{path}")
    }
}

/// Status code and raw body of a Controller response.
#[derive(Debug, Clone)]
pub(crate) struct ApiResponse {
    pub(crate) status: u16,
    pub(crate) body: String,
}

impl ApiResponse {
    /// Parses the body as JSON.
    pub(crate) fn json(&self, context: &str) -> Result<Value, ControllerError> {
        serde_json::from_str(&self.body).map_err(|e| ControllerError::MalformedResponse {
            context: context.to_owned(),
            message: format!("body is not valid JSON: {e}"),
        })
    }

    /// Builds the error reported when this status was not expected.
    pub(crate) fn unexpected(&self, context: &str) -> ControllerError {
        ControllerError::UnexpectedStatus {
            status: self.status,
            context: context.to_owned(),
            body: self.body.clone(),
        }
    }
}

/// Thin wrapper over a `reqwest` client bound to one Controller.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    client: Client,
    base_url: String,
}

impl Transport {
    /// Creates a transport for `base_url`, optionally accepting any TLS
    /// certificate.
    pub(crate) fn new(base_url: &str, trust_cert: bool) -> Result<Self, ControllerError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(trust_cert)
            .build()
            .map_err(|e| ControllerError::ClientBuild {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, build_endpoint(path))
    }

    /// Sends one request and buffers the response body.
    ///
    /// `POST` and `PATCH` always carry `Content-Type: application/json`,
    /// even without a body.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        authorization: Option<&str>,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ControllerError> {
        let url = self.url_for(path);
        debug!(%method, %url, "sending Controller request");

        let mut request = self.client.request(method.clone(), &url);
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        if method == Method::POST || method == Method::PATCH {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(json) = body {
            request = request.body(json.to_string());
        }

        let transport_error = |e: reqwest::Error| ControllerError::Request {
            method: method.to_string(),
            url: url.clone(),
            message: e.to_string(),
        };
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        debug!(status = status.as_u16(), "Controller responded");
        trace!(body = %text, "Controller response body");
        Ok(ApiResponse {
            status: status.as_u16(),
            body: text,
        })
    }

    /// Issues an unauthenticated `HEAD` and reports whether the path exists.
    pub(crate) async fn supports(&self, path: &str) -> Result<bool, ControllerError> {
        let response = self.send(Method::HEAD, path, None, None).await?;
        let supported = response.status != StatusCode::NOT_FOUND.as_u16();
        debug!(path, supported, "probed Controller capability");
        Ok(supported)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[rstest]
    #[case("jobs/", "/api/v2/jobs/")]
    #[case("/jobs/7/", "/api/v2/jobs/7/")]
    #[case("/api/v2/tokens/", "/api/v2/tokens/")]
    #[case("/api/o/", "/api/o/")]
    #[case("ping/", "/api/v2/ping/")]
    fn endpoints_are_rooted_under_api(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(build_endpoint(input), expected);
    }

    #[rstest]
    fn base_url_loses_trailing_slashes() {
        let transport =
            Transport::new("https://tower.example.com//", false).expect("client should build");
        assert_eq!(transport.base_url(), "https://tower.example.com");
        assert_eq!(
            transport.url_for("jobs/"),
            "https://tower.example.com/api/v2/jobs/"
        );
    }

    #[tokio::test]
    async fn post_carries_json_content_type_and_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/jobs/3/cancel/"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        let response = transport
            .send(Method::POST, "/jobs/3/cancel/", Some("Bearer abc"), None)
            .await
            .expect("request should succeed");
        assert_eq!(response.status, 202);
    }

    #[tokio::test]
    async fn head_probe_treats_404_as_unsupported() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/api/o/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/api/v2/authtoken"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let transport = Transport::new(&server.uri(), false).expect("client should build");
        assert!(!transport.supports("/api/o/").await.expect("probe should run"));
        assert!(
            transport
                .supports("/api/v2/authtoken")
                .await
                .expect("probe should run")
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_request_error() {
        let transport = Transport::new("http://127.0.0.1:9", false).expect("client should build");
        let error = transport
            .send(Method::GET, "ping/", None, None)
            .await
            .expect_err("connection should be refused");
        assert!(matches!(error, ControllerError::Request { .. }));
    }
}
