//! Wiremock helpers shared by controller unit tests.

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{ControllerConnection, ServerCredentials};

/// Credentials that never trigger token negotiation.
pub(crate) fn bearer() -> ServerCredentials {
    ServerCredentials::Token {
        secret: String::from("test-token"),
    }
}

/// Starts a mock Controller whose ping page reports `version`.
pub(crate) async fn controller_with_version(version: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/ping/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": version })))
        .mount(&server)
        .await;
    server
}

/// Opens a bearer-authenticated connection to `server`.
pub(crate) async fn connect(server: &MockServer) -> ControllerConnection {
    ControllerConnection::open(&server.uri(), false, Some(bearer()))
        .await
        .expect("connection should open")
}

/// Wraps `results` in a single list page.
pub(crate) fn page(results: &Value) -> Value {
    let count = results.as_array().map_or(0, Vec::len);
    json!({ "count": count, "next": null, "results": results })
}

/// Serves `body` for `GET path`.
pub(crate) async fn mount_get(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serves `body` for `GET path?key=value`.
pub(crate) async fn mount_query(server: &MockServer, at: &str, key: &str, value: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .and(query_param(key, value))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
