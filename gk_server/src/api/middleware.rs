//! Authentication middleware for protected endpoints.
//!
//! Runs the request gate on the `Authorization` header and injects the
//! resolved [`AuthenticatedUser`] into request extensions for downstream
//! handlers.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get, middleware};
//! # use gk_server::api::middleware::auth_middleware;
//! # use gk_server::api::AppState;
//! # async fn handler() {}
//! # let state: AppState = unimplemented!();
//!
//! let protected_routes: Router<AppState> = Router::new()
//!     .route("/api/protected", get(handler))
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
//! # let _ = protected_routes;
//! ```
//!
//! # Extracting the User
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use gk_server::api::middleware::AuthenticatedUser;
//!
//! async fn protected_handler(Extension(user): Extension<AuthenticatedUser>) -> String {
//!     format!("Authenticated as user {}", user.0)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use gatekeeper::auth::UserId;

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;
use crate::metrics;

/// Identity attached to a request that passed the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Authentication middleware that validates bearer tokens and injects the user.
///
/// # Behavior
///
/// - **Success**: token verifies and is the user's live session → injects
///   [`AuthenticatedUser`] → calls next handler
/// - **Missing, malformed, forged or expired token**: `404` with code `UNAUTHORIZED`
/// - **Superseded or evicted session**: `404` with code `NOT_FOUND`
/// - **Cache failure**: `500`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.gate.authorize(header).await {
        Ok(user_id) => {
            request.extensions_mut().insert(AuthenticatedUser(user_id));
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            metrics::gate_rejections_total(rejection.stage.as_str());
            if rejection.error.is_validation() {
                log_security_event(
                    "gate_rejected",
                    None,
                    &format!("bearer token rejected after stage {}", rejection.stage),
                );
            }
            Err(ApiError::protected(rejection.error))
        }
    }
}
