//! End-to-end checks of the Terraform HTTP backend protocol against the router

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Method, Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use statehouse_server::auth::{BasicAuth, StaticPrincipal, TrustedHeader};
use statehouse_server::route::RouteLayout;
use statehouse_server::{AppState, app};
use statehouse_state::backends::{LocalBackend, MemoryBackend};
use statehouse_state::{LockInfo, Stores};
use tower::ServiceExt;

const LOCK_ABC: &str = r#"{"ID":"abc","Operation":"apply","Info":"","Who":"u","Version":"1.5","Created":"","Path":""}"#;

struct Response {
    status: StatusCode,
    content_type: Option<String>,
    body: Bytes,
}

impl Response {
    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn lock(&self) -> LockInfo {
        serde_json::from_slice(&self.body).unwrap()
    }
}

fn basic_auth(user: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:pw", user)))
}

fn memory_app(layout: RouteLayout) -> Router {
    let state = AppState::new(
        layout,
        Stores::shared(MemoryBackend::new()),
        Arc::new(BasicAuth::new(None)),
    );
    app(state)
}

async fn send(app: &Router, method: &str, uri: &str, user: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(Method::from_bytes(method.as_bytes()).unwrap())
        .uri(uri)
        .header(header::AUTHORIZATION, basic_auth(user))
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();

    Response {
        status,
        content_type,
        body,
    }
}

#[tokio::test]
async fn test_lock_unlock_scenario() {
    let app = memory_app(RouteLayout::States);

    let res = send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.is_empty());

    let res = send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(res.json()["ID"], "abc");
    assert_eq!(res.content_type.as_deref(), Some("application/json"));

    let res = send(&app, "DELETE", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "GET", "/states/net/lock", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json(), serde_json::json!({}));
}

#[tokio::test]
async fn test_conflict_returns_first_lock_verbatim() {
    let app = memory_app(RouteLayout::States);
    send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;

    let other = r#"{"ID":"def","Operation":"plan","Who":"someone-else"}"#;
    let res = send(&app, "PUT", "/states/net/lock", "u", other).await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(
        res.json(),
        serde_json::from_str::<serde_json::Value>(LOCK_ABC).unwrap()
    );
}

#[tokio::test]
async fn test_unlock_with_wrong_id_keeps_lock() {
    let app = memory_app(RouteLayout::States);
    send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;

    let res = send(&app, "DELETE", "/states/net/lock", "u", r#"{"ID":"other"}"#).await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(res.lock().id, "abc");

    let res = send(&app, "GET", "/states/net/lock", "u", "").await;
    assert_eq!(res.lock().id, "abc");
}

#[tokio::test]
async fn test_unlock_when_unlocked_is_locked_status() {
    let app = memory_app(RouteLayout::States);

    let res = send(&app, "DELETE", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(res.json(), serde_json::json!({}));
}

#[tokio::test]
async fn test_lock_and_unlock_require_id() {
    let app = memory_app(RouteLayout::States);

    let res = send(&app, "PUT", "/states/net/lock", "u", r#"{"Operation":"apply"}"#).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = send(&app, "DELETE", "/states/net/lock", "u", r#"{"Operation":"apply"}"#).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = send(&app, "PUT", "/states/net/lock", "u", "garbage").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // Nothing was locked by the rejected requests
    let res = send(&app, "GET", "/states/net/lock", "u", "").await;
    assert_eq!(res.json(), serde_json::json!({}));
}

#[tokio::test]
async fn test_lock_extension_methods() {
    let app = memory_app(RouteLayout::States);

    let res = send(&app, "LOCK", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "UNLOCK", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_purge_removes_foreign_lock() {
    let app = memory_app(RouteLayout::States);
    send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;

    let res = send(&app, "PUT", "/states/net/lock/purge", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body.is_empty());

    let res = send(&app, "GET", "/states/net/lock", "u", "").await;
    assert_eq!(res.json(), serde_json::json!({}));

    // Purging an unlocked project also succeeds
    let res = send(&app, "PUT", "/states/net/lock/purge", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_inspect_is_idempotent() {
    let app = memory_app(RouteLayout::States);
    send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;

    let first = send(&app, "GET", "/states/net/lock", "u", "").await;
    for _ in 0..3 {
        let again = send(&app, "GET", "/states/net/lock", "u", "").await;
        assert_eq!(again.status, StatusCode::OK);
        assert_eq!(again.body, first.body);
    }
}

#[tokio::test]
async fn test_state_roundtrip_without_lock() {
    let app = memory_app(RouteLayout::States);

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(res.body.is_empty());

    let res = send(&app, "POST", "/states/net", "u", r#"{"version":4,"serial":1}"#).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type.as_deref(), Some("application/json"));
    assert_eq!(&res.body[..], br#"{"version":4,"serial":1}"#);

    let res = send(&app, "DELETE", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_post_is_gated_by_lock_id() {
    let app = memory_app(RouteLayout::States);
    send(&app, "POST", "/states/net", "u", "original").await;
    send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;

    let res = send(&app, "POST", "/states/net?ID=wrong", "u", "clobbered").await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(res.lock().id, "abc");

    let res = send(&app, "POST", "/states/net", "u", "clobbered").await;
    assert_eq!(res.status, StatusCode::LOCKED);

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(&res.body[..], b"original");

    let res = send(&app, "POST", "/states/net?ID=abc", "u", "updated").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(&res.body[..], b"updated");
}

#[tokio::test]
async fn test_delete_state_refused_while_locked() {
    let app = memory_app(RouteLayout::States);
    send(&app, "POST", "/states/net", "u", "state").await;
    send(&app, "PUT", "/states/net/lock", "u", LOCK_ABC).await;

    let res = send(&app, "DELETE", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(res.lock().id, "abc");

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_principals_are_isolated() {
    let app = memory_app(RouteLayout::States);
    send(&app, "POST", "/states/net", "alice", "alice-state").await;
    send(&app, "PUT", "/states/net/lock", "alice", LOCK_ABC).await;

    let res = send(&app, "GET", "/states/net", "bob", "").await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = send(&app, "PUT", "/states/net/lock", "bob", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "POST", "/states/net", "bob", "bob-state").await;
    assert_eq!(res.status, StatusCode::LOCKED);

    let res = send(&app, "POST", "/states/net?ID=abc", "bob", "bob-state").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "GET", "/states/net", "alice", "").await;
    assert_eq!(&res.body[..], b"alice-state");
}

#[tokio::test]
async fn test_unmatched_routes() {
    let app = memory_app(RouteLayout::States);

    for (method, uri) in [
        ("GET", "/"),
        ("GET", "/states"),
        ("PUT", "/states/net"),
        ("POST", "/states/net/lock"),
        ("GET", "/states/net/lock/purge"),
        ("GET", "/net/v1"),
    ] {
        let res = send(&app, method, uri, "u", "").await;
        assert_eq!(res.status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        assert_eq!(&res.body[..], b"Not found.\n");
    }
}

#[tokio::test]
async fn test_invalid_project_is_bad_request() {
    let app = memory_app(RouteLayout::States);

    let res = send(&app, "GET", "/states//lock", "u", "").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = send(&app, "GET", "/states/..%2Fbob", "u", "").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_credentials_is_unauthorized() {
    let app = memory_app(RouteLayout::States);
    let request = Request::builder()
        .method(Method::GET)
        .uri("/states/net")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn test_empty_principal_is_server_error() {
    let basic = memory_app(RouteLayout::States);

    let res = send(&basic, "PUT", "/states/net/lock", "", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

    let state = AppState::new(
        RouteLayout::States,
        Stores::shared(MemoryBackend::new()),
        Arc::new(TrustedHeader::new(header::HeaderName::from_static(
            "x-forwarded-user",
        ))),
    );
    let request = Request::builder()
        .method(Method::GET)
        .uri("/states/net")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_missing_project_checked_before_principal() {
    let state = AppState::new(
        RouteLayout::States,
        Stores::shared(MemoryBackend::new()),
        Arc::new(StaticPrincipal::new("")),
    );
    let request = Request::builder()
        .method(Method::GET)
        .uri("/states//lock")
        .body(Body::empty())
        .unwrap();

    let response = app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_versioned_layout() {
    let app = memory_app(RouteLayout::Versioned);

    let res = send(&app, "PUT", "/net/v1/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "POST", "/net/v1?ID=abc", "u", "state").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "PUT", "/net/v1/lock/purge", "u", "").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "GET", "/states/net", "u", "").await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lock_survives_restart_on_local_backend() {
    let dir = tempfile::tempdir().unwrap();
    let local = || {
        let state = AppState::new(
            RouteLayout::States,
            Stores::shared(LocalBackend::with_root(dir.path().to_path_buf())),
            Arc::new(BasicAuth::new(None)),
        );
        app(state)
    };

    let first = local();
    let res = send(&first, "PUT", "/states/net/lock", "u", LOCK_ABC).await;
    assert_eq!(res.status, StatusCode::OK);
    send(&first, "POST", "/states/net?ID=abc", "u", "state").await;

    // A new server over the same directory starts cold and reloads the lock
    let second = local();
    let res = send(&second, "PUT", "/states/net/lock", "u", r#"{"ID":"def"}"#).await;
    assert_eq!(res.status, StatusCode::LOCKED);
    assert_eq!(res.lock().id, "abc");

    let res = send(&second, "GET", "/states/net", "u", "").await;
    assert_eq!(&res.body[..], b"state");
}

#[tokio::test]
async fn test_state_body_limit() {
    let state = AppState::new(
        RouteLayout::States,
        Stores::shared(MemoryBackend::new()),
        Arc::new(StaticPrincipal::new("ci")),
    )
    .with_max_state_bytes(16);
    let app = app(state);

    let res = send(&app, "POST", "/states/net", "ignored", "0123456789").await;
    assert_eq!(res.status, StatusCode::OK);

    let res = send(&app, "POST", "/states/net", "ignored", "0123456789abcdefXYZ").await;
    assert_eq!(res.status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unsafe_basic_username_is_unauthorized() {
    let app = memory_app(RouteLayout::States);

    for user in ["a/b", "..", "a\\b"] {
        let res = send(&app, "GET", "/states/net", user, "").await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "user {:?}", user);
    }
}
