//! Authentication API handlers.
//!
//! Registration and login both answer with a fresh token pair. Either call
//! replaces whatever session the user had before.
//!
//! # Examples
//!
//! Register a new user:
//! ```bash
//! curl -X POST http://localhost:8080/api/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"username": "alice", "email": "alice@example.com", "password": "hunter22"}'
//! ```
//!
//! Login:
//! ```bash
//! curl -X POST http://localhost:8080/api/auth/login \
//!   -H "Content-Type: application/json" \
//!   -d '{"email": "alice@example.com", "password": "hunter22"}'
//! ```

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use gatekeeper::auth::{AuthError, LoginRequest, RegisterRequest, TokenPair};

use super::{AppState, error::ApiError};
use crate::logging::log_security_event;
use crate::metrics::{self, Outcome};

fn outcome_of(err: &AuthError) -> Outcome {
    match err.root() {
        AuthError::Credentials(_) => Outcome::InvalidCredentials,
        other if other.is_validation() => Outcome::Rejected,
        _ => Outcome::Error,
    }
}

/// Register a new user account and log them in.
///
/// # Request Body
///
/// ```json
/// {
///   "username": "alice",
///   "email": "alice@example.com",
///   "password": "hunter22"
/// }
/// ```
///
/// # Response
///
/// On success, returns `201 Created` with the token pair:
/// ```json
/// {
///   "accessToken": "eyJhbGciOiJIUzI1NiIs...",
///   "accessTokenExpiresIn": 900,
///   "refreshToken": "6f1c...",
///   "refreshTokenExpiresIn": 604800,
///   "tokenType": "Bearer"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: undecodable body, bad field, username or email taken
/// - `500 Internal Server Error`: store or signing failure
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenPair>), ApiError> {
    let Json(request) = payload.map_err(ApiError::invalid_body)?;

    match state.auth_manager.register(request).await {
        Ok(pair) => {
            metrics::registrations_total(Outcome::Success);
            Ok((StatusCode::CREATED, Json(pair)))
        }
        Err(err) => {
            metrics::registrations_total(outcome_of(&err));
            Err(ApiError::public(err))
        }
    }
}

/// Authenticate a user and issue a new token pair.
///
/// # Request Body
///
/// ```json
/// {
///   "email": "alice@example.com",
///   "password": "hunter22"
/// }
/// ```
///
/// # Response
///
/// On success, returns `200 OK` with the token pair.
///
/// # Errors
///
/// - `400 Bad Request`: undecodable body, bad field, or wrong credentials
/// - `500 Internal Server Error`: store or signing failure
///
/// # Security
///
/// Unknown emails and wrong passwords produce the same response.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = payload.map_err(ApiError::invalid_body)?;

    match state.auth_manager.login(request).await {
        Ok(pair) => {
            metrics::login_attempts_total(Outcome::Success);
            Ok(Json(pair))
        }
        Err(err) => {
            let outcome = outcome_of(&err);
            metrics::login_attempts_total(outcome);
            if let AuthError::Credentials(reason) = err.root() {
                log_security_event("failed_login", None, &reason.to_string());
            }
            Err(ApiError::public(err))
        }
    }
}
