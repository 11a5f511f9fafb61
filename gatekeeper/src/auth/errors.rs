//! Authentication error types.
//!
//! Errors fall into two disjoint kinds. Caller-correctable rejections carry a
//! [`ValidationError`] (or a [`CredentialFailure`], which renders as one).
//! Everything else is infrastructure: opaque to the caller, logged server-side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Machine-readable code attached to every validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad input shape, duplicate account, wrong credentials
    ValidationError,
    /// Absent, malformed, expired or forged bearer token
    Unauthorized,
    /// Missing resource or missing/superseded session
    NotFound,
    /// Request body could not be decoded
    InvalidRequestBody,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured, client-correctable rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    pub field: String,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: field.into(),
        }
    }

    /// Shorthand for an input-shape rejection on `field`.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message, field)
    }

    /// Shorthand for a bearer-token rejection.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message, "accessToken")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Why a login was refused.
///
/// Both variants surface to the caller as the same validation error so the
/// response never reveals whether an email is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownEmail,
    PasswordMismatch,
}

impl fmt::Display for CredentialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialFailure::UnknownEmail => f.write_str("email is not registered"),
            CredentialFailure::PasswordMismatch => f.write_str("password does not match"),
        }
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Caller-correctable rejection
    #[error("Validation failed: {0}")]
    Validation(ValidationError),

    /// Login refused
    #[error("Authentication failed: {0}")]
    Credentials(CredentialFailure),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Password hashing failed
    #[error("Password hashing failed")]
    HashingFailed,

    /// Signing secret or other configuration is unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store could not serve the call at all
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// JWT signing error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Store access exceeded its deadline
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// Infrastructure error with the layer it crossed
    #[error("{context}: {source}")]
    Context {
        context: &'static str,
        #[source]
        source: Box<AuthError>,
    },
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::Validation(err)
    }
}

impl AuthError {
    /// Whether the caller can correct this by changing the request.
    pub fn is_validation(&self) -> bool {
        matches!(self, AuthError::Validation(_) | AuthError::Credentials(_))
    }

    /// The client-visible rejection, or `None` for infrastructure errors.
    pub fn validation(&self) -> Option<ValidationError> {
        match self {
            AuthError::Validation(err) => Some(err.clone()),
            AuthError::Credentials(_) => Some(ValidationError::invalid(
                "password",
                "Password is incorrect",
            )),
            _ => None,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self.validation() {
            Some(err) => err.message,
            None => "Internal server error".to_string(),
        }
    }

    /// Innermost error, skipping context frames.
    pub fn root(&self) -> &AuthError {
        match self {
            AuthError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Adds layer context to infrastructure errors.
///
/// Validation and credential errors pass through untouched.
pub trait AuthResultExt<T> {
    fn context(self, context: &'static str) -> AuthResult<T>;
}

impl<T> AuthResultExt<T> for AuthResult<T> {
    fn context(self, context: &'static str) -> AuthResult<T> {
        self.map_err(|err| {
            if err.is_validation() {
                err
            } else {
                AuthError::Context {
                    context,
                    source: Box::new(err),
                }
            }
        })
    }
}
