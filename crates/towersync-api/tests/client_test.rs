#![allow(clippy::unwrap_used)]
// Integration tests for the query channel and login using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use towersync_api::{
    Error, LoginCredentials, Request, Response, ResponseError, TowerClient, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, TowerClient) {
    let server = MockServer::start().await;
    let endpoint = Url::parse(&format!("{}/v2/api", server.uri())).unwrap();
    let client = TowerClient::new(
        endpoint,
        LoginCredentials::new("admin", SecretString::from("tower-password")),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

fn login_ok(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": { "login": { "token": token } },
        "errors": []
    }))
}

// ── Query tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_query_round_trip() {
    let (server, client) = setup().await;

    let request = Request::new("query($id: ID!) { vm(where: {id: $id}) { id name } }")
        .with_variable("id", json!("vm-1"));

    Mock::given(method("POST"))
        .and(path("/v2/api"))
        .and(header("Content-Type", "application/json"))
        .and(header("Accept", "application/json"))
        .and(body_json(&request))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "vm": { "id": "vm-1", "name": "web" } },
            "errors": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client.query(&request).await.unwrap();

    assert_eq!(
        resp,
        Response {
            data: json!({ "vm": { "id": "vm-1", "name": "web" } }),
            errors: vec![],
        }
    );
}

#[tokio::test]
async fn test_query_decodes_error_body_despite_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Cannot query field \"vmz\"", "code": "GRAPHQL_VALIDATION_FAILED" }]
        })))
        .mount(&server)
        .await;

    let resp = client.query(&Request::new("{ vmz { id } }")).await.unwrap();

    assert_eq!(
        resp.errors,
        vec![ResponseError {
            message: "Cannot query field \"vmz\"".into(),
            code: Some("GRAPHQL_VALIDATION_FAILED".into()),
        }]
    );
}

#[tokio::test]
async fn test_query_undecodable_body_is_transport_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let result = client.query(&Request::new("{ vms { id } }")).await;

    match result {
        Err(err @ Error::Decode { status: 502, .. }) => assert!(err.is_transport()),
        other => panic!("expected Decode error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_query_unreachable_endpoint() {
    let client = TowerClient::new(
        Url::parse("http://127.0.0.1:1/v2/api").unwrap(),
        LoginCredentials::new("admin", SecretString::from("x")),
        &TransportConfig::default(),
    )
    .unwrap();

    let result = client.query(&Request::new("{ vms { id } }")).await;
    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_auth_token_is_sent_on_later_requests() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(body_string_contains("LoginInput"))
        .and(body_string_contains("tower-password"))
        .respond_with(login_ok("abc"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("Authorization", "abc"))
        .and(body_string_contains("vms"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "vms": [] }, "errors": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.auth().await.unwrap();
    assert!(client.is_authenticated());

    let resp = client.query(&Request::new("{ vms { id } }")).await.unwrap();
    assert!(resp.is_ok());
    assert_eq!(resp.data, json!({ "vms": [] }));
}

#[tokio::test]
async fn test_auth_rejected_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "invalid username or password", "code": "LOGIN_FAILED" }]
        })))
        .mount(&server)
        .await;

    let result = client.auth().await;

    assert!(
        matches!(&result, Err(Error::Authentication { message }) if message.contains("invalid username")),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_auth_missing_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "login": { "token": 42 } }, "errors": [] })),
        )
        .mount(&server)
        .await;

    let result = client.auth().await;

    assert!(
        matches!(&result, Err(Error::Authentication { message }) if message.contains("data.login.token")),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_auth_transport_failure_is_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let result = client.auth().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}
