//! Integration tests for the HTTP surface.
//!
//! Drives the full router with `oneshot` over the in-memory stores: status
//! codes, error bodies, the request gate, and request ids.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use gatekeeper::auth::{AuthError, AuthManager, AuthResult, CredentialVerifier, TokenCodec};
use gatekeeper::cache::{KeyValueCache, MemoryCache, SessionStore};
use gatekeeper::db::MemoryAccountRepository;
use gk_server::api::{AppState, create_router, request_id::REQUEST_ID_HEADER};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // For `oneshot` method

const SECRET: &str = "server-test-secret-0123456789abcdef";

struct TestServer {
    app: Router,
    accounts: MemoryAccountRepository,
    cache: MemoryCache,
}

/// Cache that refuses every call
struct DownCache;

#[async_trait]
impl KeyValueCache for DownCache {
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AuthResult<()> {
        Err(AuthError::StoreUnavailable("cache unavailable".to_string()))
    }

    async fn get(&self, _key: &str) -> AuthResult<Option<String>> {
        Err(AuthError::StoreUnavailable("cache unavailable".to_string()))
    }

    async fn ping(&self) -> AuthResult<()> {
        Err(AuthError::StoreUnavailable("cache unavailable".to_string()))
    }
}

/// Cache whose calls never complete
struct StalledCache;

#[async_trait]
impl KeyValueCache for StalledCache {
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AuthResult<()> {
        std::future::pending().await
    }

    async fn get(&self, _key: &str) -> AuthResult<Option<String>> {
        std::future::pending().await
    }

    async fn ping(&self) -> AuthResult<()> {
        std::future::pending().await
    }
}

fn router_for(
    accounts: &MemoryAccountRepository,
    cache: Arc<dyn KeyValueCache>,
    secret: &str,
) -> Router {
    let auth_manager = AuthManager::new(
        Arc::new(accounts.clone()),
        cache,
        TokenCodec::new(secret),
        CredentialVerifier::new("server-test-pepper"),
    );
    create_router(AppState::new(auth_manager), Duration::from_secs(15))
}

/// Helper to create test server over fresh in-memory stores
fn create_test_server() -> TestServer {
    let accounts = MemoryAccountRepository::new();
    let cache = MemoryCache::new();
    let app = router_for(&accounts, Arc::new(cache.clone()), SECRET);
    TestServer {
        app,
        accounts,
        cache,
    }
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn me_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/users/me");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn alice() -> Value {
    json!({
        "username": "alice",
        "email": "alice@example.com",
        "password": "hunter22"
    })
}

fn alice_login() -> Value {
    json!({ "email": "alice@example.com", "password": "hunter22" })
}

fn bearer(body: &Value) -> String {
    format!("Bearer {}", body["accessToken"].as_str().unwrap())
}

#[tokio::test]
async fn test_register_then_fetch_profile() {
    let server = create_test_server();

    let (status, tokens) = send(&server.app, json_request("/api/auth/register", alice())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tokens["tokenType"], "Bearer");
    assert_eq!(tokens["accessTokenExpiresIn"], 900);
    assert_eq!(tokens["refreshTokenExpiresIn"], 604_800);
    assert!(tokens["refreshToken"].as_str().is_some());

    let (status, profile) = send(&server.app, me_request(Some(&bearer(&tokens)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["email"], "alice@example.com");
    assert!(profile.get("password").is_none());
    assert!(profile.get("createdAt").is_some());
}

#[tokio::test]
async fn test_register_short_username() {
    let server = create_test_server();
    let body = json!({
        "username": "abc",
        "email": "abc.user@example.com",
        "password": "hunter22"
    });

    let (status, error) = send(&server.app, json_request("/api/auth/register", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "VALIDATION_ERROR");
    assert_eq!(error["field"], "username");
    assert_eq!(error["message"], "Username must be at least 4 characters");
    assert_eq!(server.accounts.user_count(), 0);
    assert_eq!(server.cache.sets(), 0);
}

#[tokio::test]
async fn test_register_missing_field_is_reported_per_field() {
    let server = create_test_server();
    let body = json!({ "username": "alice", "password": "hunter22" });

    let (status, error) = send(&server.app, json_request("/api/auth/register", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["field"], "email");
    assert_eq!(error["message"], "Email is required to not be empty");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let server = create_test_server();
    send(&server.app, json_request("/api/auth/register", alice())).await;

    let body = json!({
        "username": "alice_two",
        "email": "alice@example.com",
        "password": "hunter22"
    });
    let (status, error) = send(&server.app, json_request("/api/auth/register", body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["field"], "email");
    assert_eq!(error["message"], "Email is already exist");
}

#[tokio::test]
async fn test_login_failures_share_one_shape() {
    let server = create_test_server();
    send(&server.app, json_request("/api/auth/register", alice())).await;

    let wrong_password = json!({ "email": "alice@example.com", "password": "not-hunter" });
    let unknown_email = json!({ "email": "nobody.here@example.com", "password": "hunter22" });

    let (status_a, body_a) = send(&server.app, json_request("/api/auth/login", wrong_password)).await;
    let (status_b, body_b) = send(&server.app, json_request("/api/auth/login", unknown_email)).await;

    assert_eq!(status_a, StatusCode::BAD_REQUEST);
    assert_eq!(status_a, status_b);
    assert_eq!(body_a, body_b);
    assert_eq!(body_a["code"], "VALIDATION_ERROR");
    assert_eq!(body_a["field"], "password");
    assert_eq!(body_a["message"], "Password is incorrect");
}

#[tokio::test]
async fn test_login_issues_working_token() {
    let server = create_test_server();
    send(&server.app, json_request("/api/auth/register", alice())).await;

    let (status, tokens) = send(&server.app, json_request("/api/auth/login", alice_login())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, profile) = send(&server.app, me_request(Some(&bearer(&tokens)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
}

#[tokio::test]
async fn test_second_login_supersedes_first_token() {
    let server = create_test_server();
    send(&server.app, json_request("/api/auth/register", alice())).await;
    let (_, first) = send(&server.app, json_request("/api/auth/login", alice_login())).await;

    let (_, second) = send(&server.app, json_request("/api/auth/login", alice_login())).await;

    let (status, error) = send(&server.app, me_request(Some(&bearer(&first)))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NOT_FOUND");
    assert_eq!(error["message"], "Authorization token is expired");

    let (status, _) = send(&server.app, me_request(Some(&bearer(&second)))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_authorization_header() {
    let server = create_test_server();

    let (status, error) = send(&server.app, me_request(None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "UNAUTHORIZED");
    assert_eq!(error["field"], "accessToken");
    assert_eq!(error["message"], "No authentication token is provided");
}

#[tokio::test]
async fn test_wrong_scheme_is_rejected() {
    let server = create_test_server();

    let (status, error) = send(&server.app, me_request(Some("Basic YWxpY2U6aHVudGVy"))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["message"], "Authentication token format is not match");
}

#[tokio::test]
async fn test_garbage_bearer_rejected_before_store_access() {
    let server = create_test_server();

    let (status, error) = send(&server.app, me_request(Some("Bearer garbage"))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "UNAUTHORIZED");
    assert_eq!(server.cache.gets(), 0);
    assert_eq!(server.accounts.calls(), 0);
}

#[tokio::test]
async fn test_valid_signature_without_session() {
    let server = create_test_server();
    let token = TokenCodec::new(SECRET).mint(77).unwrap();

    let (status, error) = send(&server.app, me_request(Some(&format!("Bearer {token}")))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NOT_FOUND");
    assert_eq!(error["message"], "Authorization token not found or expired");
}

#[tokio::test]
async fn test_live_session_for_deleted_account() {
    let server = create_test_server();
    let pair = TokenCodec::new(SECRET).mint_pair(404).unwrap();
    SessionStore::new(Arc::new(server.cache.clone()))
        .replace(404, &pair)
        .await
        .unwrap();

    let (status, error) = send(
        &server.app,
        me_request(Some(&format!("Bearer {}", pair.access_token))),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["message"], "User not found");
    assert_eq!(error["field"], "userId");
}

#[tokio::test]
async fn test_undecodable_body() {
    let server = create_test_server();
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, error) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_REQUEST_BODY");
}

#[tokio::test]
async fn test_missing_content_type() {
    let server = create_test_server();
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .body(Body::from(alice().to_string()))
        .unwrap();

    let (status, error) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "INVALID_REQUEST_BODY");
    assert_eq!(server.accounts.calls(), 0);
}

#[tokio::test]
async fn test_signing_failure_is_opaque() {
    let accounts = MemoryAccountRepository::new();
    let cache = MemoryCache::new();
    let app = router_for(&accounts, Arc::new(cache.clone()), "");

    let (status, error) = send(&app, json_request("/api/auth/register", alice())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error,
        json!({ "code": "INTERNAL_SERVER_ERROR", "message": "Internal server error" })
    );
    assert_eq!(accounts.user_count(), 0);
    assert_eq!(cache.sets(), 0);
}

#[tokio::test]
async fn test_cache_outage_on_protected_route() {
    let accounts = MemoryAccountRepository::new();
    let app = router_for(&accounts, Arc::new(DownCache), SECRET);
    let token = TokenCodec::new(SECRET).mint(1).unwrap();

    let (status, error) = send(&app, me_request(Some(&format!("Bearer {token}")))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["code"], "INTERNAL_SERVER_ERROR");
    assert!(error.get("field").is_none());
}

#[tokio::test]
async fn test_register_with_cache_down_keeps_account() {
    let accounts = MemoryAccountRepository::new();
    let app = router_for(&accounts, Arc::new(DownCache), SECRET);

    let (status, error) = send(&app, json_request("/api/auth/register", alice())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error,
        json!({ "code": "INTERNAL_SERVER_ERROR", "message": "Internal server error" })
    );
    assert_eq!(accounts.user_count(), 1);
    assert_eq!(accounts.rollbacks(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_cache_on_protected_route_is_500() {
    let accounts = MemoryAccountRepository::new();
    let app = router_for(&accounts, Arc::new(StalledCache), SECRET);
    let token = TokenCodec::new(SECRET).mint(1).unwrap();

    let (status, error) = send(&app, me_request(Some(&format!("Bearer {token}")))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["code"], "INTERNAL_SERVER_ERROR");
    assert!(error.get("field").is_none());
}

#[tokio::test]
async fn test_unknown_route_still_gets_request_id() {
    let server = create_test_server();
    let request = Request::builder()
        .uri("/api/no/such/route")
        .body(Body::empty())
        .unwrap();

    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_health_ok() {
    let server = create_test_server();
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&server.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "database": true, "cache": true }));
}

#[tokio::test]
async fn test_health_degraded() {
    let accounts = MemoryAccountRepository::new();
    let app = router_for(&accounts, Arc::new(DownCache), SECRET);
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({ "status": "degraded", "database": true, "cache": false }));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();
    let request = Request::builder()
        .uri("/api/health")
        .header(REQUEST_ID_HEADER, "trace-me-42")
        .body(Body::empty())
        .unwrap();

    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-me-42");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let server = create_test_server();
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();

    let response = server.app.clone().oneshot(request).await.unwrap();

    let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
    assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
}
