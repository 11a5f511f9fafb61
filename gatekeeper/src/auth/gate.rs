//! Request gate for protected routes.
//!
//! A bearer token is accepted only if it verifies cryptographically *and* is
//! the token currently cached for its user. The second check is what makes a
//! newer login retire older tokens before they expire.

use super::{
    errors::{AuthError, AuthResult, ErrorCode, ValidationError},
    models::UserId,
    token::{TokenCodec, VerifiedToken, extract_bearer},
};
use crate::cache::SessionStore;
use crate::timeouts::{DEFAULT_STORE_TIMEOUT, with_timeout};
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Furthest point a request reached in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    NoToken,
    HeaderExtracted,
    SignatureVerified,
    SessionMatched,
    Authorized,
}

impl GateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStage::NoToken => "no_token",
            GateStage::HeaderExtracted => "header_extracted",
            GateStage::SignatureVerified => "signature_verified",
            GateStage::SessionMatched => "session_matched",
            GateStage::Authorized => "authorized",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected request and the last stage it passed.
#[derive(Debug)]
pub struct GateRejection {
    pub stage: GateStage,
    pub error: AuthError,
}

impl From<GateRejection> for AuthError {
    fn from(rejection: GateRejection) -> Self {
        rejection.error
    }
}

/// Validates bearer tokens against the codec and the session cache.
#[derive(Clone)]
pub struct RequestGate {
    tokens: TokenCodec,
    sessions: SessionStore,
    store_timeout: Duration,
}

impl RequestGate {
    pub fn new(tokens: TokenCodec, sessions: SessionStore) -> Self {
        Self {
            tokens,
            sessions,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Resolve an `Authorization` header value to the user it belongs to.
    pub async fn validate_bearer(&self, header: &str) -> AuthResult<UserId> {
        Ok(self.authorize(Some(header)).await?)
    }

    /// Run every gate stage, reporting where a rejection happened.
    ///
    /// `None` means the request carried no `Authorization` header at all.
    pub async fn authorize(&self, header: Option<&str>) -> Result<UserId, GateRejection> {
        let reject = |stage: GateStage, error: AuthError| {
            tracing::debug!(stage = %stage, error = %error, "bearer token rejected");
            GateRejection { stage, error }
        };

        let token = extract_bearer(header.unwrap_or_default())
            .map_err(|err| reject(GateStage::NoToken, err.into()))?;

        // Signature and claims are checked before any store access.
        let claims = self
            .tokens
            .decode(token)
            .map_err(|err| reject(GateStage::HeaderExtracted, err))?;
        let verified = VerifiedToken {
            token: token.to_string(),
            user_id: claims.user_id,
        };

        let cached = with_timeout(
            "session lookup",
            self.store_timeout,
            self.sessions.access_token(verified.user_id),
        )
        .await
        .map_err(|err| reject(GateStage::SignatureVerified, err))?;

        let Some(cached) = cached else {
            return Err(reject(
                GateStage::SignatureVerified,
                session_error("Authorization token not found or expired").into(),
            ));
        };

        let matches: bool = cached.as_bytes().ct_eq(verified.token.as_bytes()).into();
        if !matches {
            return Err(reject(
                GateStage::SignatureVerified,
                session_error("Authorization token is expired").into(),
            ));
        }

        tracing::trace!(user_id = verified.user_id, stage = %GateStage::Authorized, "bearer token accepted");
        Ok(verified.user_id)
    }
}

fn session_error(message: &str) -> ValidationError {
    ValidationError::new(ErrorCode::NotFound, message, "accessToken")
}
