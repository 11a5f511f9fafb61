//! JSON error responses.
//!
//! Validation errors render as `{code, message, field}`. Infrastructure errors
//! are logged here and render as an opaque 500. The status used for validation
//! errors depends on which side of the request gate the route sits.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use gatekeeper::auth::{AuthError, ErrorCode, ValidationError};
use serde_json::json;

/// Which side of the request gate a route sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Registration, login, health
    Public,
    /// Behind the request gate
    Protected,
}

impl RouteClass {
    fn validation_status(self) -> StatusCode {
        match self {
            RouteClass::Public => StatusCode::BAD_REQUEST,
            RouteClass::Protected => StatusCode::NOT_FOUND,
        }
    }
}

/// Error returned by API handlers and middleware
#[derive(Debug)]
pub enum ApiError {
    Validation {
        class: RouteClass,
        error: ValidationError,
    },
    Internal,
}

impl ApiError {
    /// Classify an auth error, logging it if it is an infrastructure failure.
    pub fn from_auth(class: RouteClass, err: AuthError) -> Self {
        match err.validation() {
            Some(error) => ApiError::Validation { class, error },
            None => {
                tracing::error!(error = %err, "request failed");
                ApiError::Internal
            }
        }
    }

    pub fn public(err: AuthError) -> Self {
        Self::from_auth(RouteClass::Public, err)
    }

    pub fn protected(err: AuthError) -> Self {
        Self::from_auth(RouteClass::Protected, err)
    }

    /// Body could not be decoded as the expected JSON document
    pub fn invalid_body(rejection: JsonRejection) -> Self {
        tracing::debug!(reason = %rejection.body_text(), "rejected request body");
        ApiError::Validation {
            class: RouteClass::Public,
            error: ValidationError::new(
                ErrorCode::InvalidRequestBody,
                "Request body is invalid",
                "body",
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { class, .. } => class.validation_status(),
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation { error, .. } => (status, Json(error)).into_response(),
            ApiError::Internal => (
                status,
                Json(json!({
                    "code": "INTERNAL_SERVER_ERROR",
                    "message": "Internal server error",
                })),
            )
                .into_response(),
        }
    }
}
