//! HTTP API for the session service.
//!
//! # Modules
//!
//! - [`auth`]: registration and login
//! - [`users`]: profile of the authenticated caller
//! - [`middleware`]: the request gate for protected endpoints
//! - [`request_id`]: per-request span, id header, request metrics
//! - [`error`]: JSON error bodies and status mapping
//!
//! # Endpoints
//!
//! ```text
//! GET  /api/health          - Store health (public)
//! POST /api/auth/register   - Register and log in (public)
//! POST /api/auth/login      - Log in (public)
//! GET  /api/users/me        - Caller's profile (auth required)
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use gk_server::api::{create_router, AppState};
//! use std::time::Duration;
//! # use gatekeeper::auth::AuthManager;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let auth_manager: AuthManager = unimplemented!();
//!
//! let state = AppState::new(auth_manager);
//! let app = create_router(state, Duration::from_secs(15));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod request_id;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use gatekeeper::auth::{AuthManager, RequestGate};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; both fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub gate: RequestGate,
}

impl AppState {
    /// Build state whose gate shares the manager's codec and session cache
    pub fn new(auth_manager: AuthManager) -> Self {
        let gate = auth_manager.gate();
        Self {
            auth_manager: Arc::new(auth_manager),
            gate,
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// `request_timeout` bounds the whole request; exceeding it answers
/// `408 Request Timeout`.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    // Public routes (no authentication middleware)
    let public_routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login));

    // Protected routes (require authentication middleware)
    let protected_routes = Router::new()
        .route("/api/users/me", get(users::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Pings the Account Store and the Session Store.
///
/// # Response
///
/// `200 OK` if both stores answer, `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/api/health
/// # {"status":"ok","database":true,"cache":true}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.auth_manager.health_check().await;

    let status_code = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if health.is_healthy() { "ok" } else { "degraded" },
        "database": health.database,
        "cache": health.cache,
    });

    (status_code, Json(response))
}
