//! Signed access tokens and opaque refresh tokens.
//!
//! Access tokens are HS256 JWTs carrying [`AccessTokenClaims`]. Refresh tokens
//! are random UUIDs with no embedded claims; they only mean something as a
//! session-cache value.

use super::{
    errors::{AuthError, AuthResult, ValidationError},
    models::{AccessTokenClaims, TOKEN_TYPE, TokenPair, UserId},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
    errors::ErrorKind,
};
use std::fmt;
use uuid::Uuid;

/// Prefix of a well-formed `Authorization` header value
pub const BEARER_PREFIX: &str = "Bearer ";

/// Issuer stamped into every access token
pub const TOKEN_ISSUER: &str = "gatekeeper";

/// The only algorithm accepted on verification
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Access token lifetime unless configured otherwise
pub fn default_access_ttl() -> Duration {
    Duration::minutes(15)
}

/// Refresh token lifetime unless configured otherwise
pub fn default_refresh_ttl() -> Duration {
    Duration::days(7)
}

/// A bearer token that passed signature and claim checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// The token exactly as presented, without the `Bearer ` prefix
    pub token: String,
    pub user_id: UserId,
}

/// Mints and verifies access tokens with a symmetric secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    leeway_secs: u64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec with default lifetimes and no clock-skew leeway.
    ///
    /// An empty secret is accepted here and reported by [`mint`](Self::mint)
    /// and [`verify`](Self::verify) as [`AuthError::Config`].
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: default_access_ttl(),
            refresh_ttl: default_refresh_ttl(),
            leeway_secs: 0,
        }
    }

    pub fn with_lifetimes(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    /// Tolerate this many seconds of clock skew on `exp` and `nbf`.
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn secret(&self) -> AuthResult<&[u8]> {
        if self.secret.is_empty() {
            return Err(AuthError::Config(
                "jwt secret key is not configured".to_string(),
            ));
        }
        Ok(self.secret.as_bytes())
    }

    /// Mint an access token for `user_id`, issued now.
    pub fn mint(&self, user_id: UserId) -> AuthResult<String> {
        self.mint_at(user_id, Utc::now())
    }

    /// Mint an access token as if issued at `issued_at`.
    pub fn mint_at(&self, user_id: UserId, issued_at: DateTime<Utc>) -> AuthResult<String> {
        let secret = self.secret()?;
        let claims = AccessTokenClaims {
            user_id,
            iss: TOKEN_ISSUER.to_string(),
            sub: format!("user:{user_id}"),
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: (issued_at + self.access_ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(secret),
        )?;

        Ok(token)
    }

    /// Generate a refresh token. Unique, unguessable, carries no claims.
    pub fn mint_opaque() -> String {
        Uuid::new_v4().to_string()
    }

    /// Mint a full access/refresh pair for `user_id`.
    pub fn mint_pair(&self, user_id: UserId) -> AuthResult<TokenPair> {
        let access_token = self.mint(user_id)?;

        Ok(TokenPair {
            access_token,
            access_token_expires_in: self.access_ttl.num_seconds(),
            refresh_token: Self::mint_opaque(),
            refresh_token_expires_in: self.refresh_ttl.num_seconds(),
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    /// Verify an `Authorization` header value.
    ///
    /// Returns the raw token and the user it was minted for. Every rejection
    /// is a [`ValidationError`] with code `UNAUTHORIZED`; only a missing secret
    /// is reported as an infrastructure error.
    pub fn verify(&self, header: &str) -> AuthResult<VerifiedToken> {
        let token = extract_bearer(header)?;
        let claims = self.decode(token)?;

        Ok(VerifiedToken {
            token: token.to_string(),
            user_id: claims.user_id,
        })
    }

    /// Check signature and claims of a bare token.
    pub fn decode(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let secret = self.secret()?;

        // Reject foreign algorithms before any key material is touched.
        let header = decode_header(token).map_err(|_| token_malformed())?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(ValidationError::unauthorized(
                "Authentication token has invalid signing method",
            )
            .into());
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = self.leeway_secs;
        validation.validate_nbf = true;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        let data = decode::<AccessTokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
            .map_err(|err| AuthError::Validation(parse_failure(err.kind())))?;

        Ok(data.claims)
    }
}

/// Split `Bearer <token>` into the token.
///
/// The prefix is case-sensitive and followed by exactly one space.
pub fn extract_bearer(header: &str) -> Result<&str, ValidationError> {
    if header.is_empty() {
        return Err(ValidationError::unauthorized(
            "No authentication token is provided",
        ));
    }

    let token = header.strip_prefix(BEARER_PREFIX).ok_or_else(|| {
        ValidationError::unauthorized("Authentication token format is not match")
    })?;

    if token.is_empty() {
        return Err(ValidationError::unauthorized("Authentication token is empty"));
    }

    Ok(token)
}

fn token_malformed() -> AuthError {
    ValidationError::unauthorized("Authentication token is malformed").into()
}

fn parse_failure(kind: &ErrorKind) -> ValidationError {
    let message = match kind {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            "Authentication token is malformed"
        }
        ErrorKind::ExpiredSignature => "Authentication token is expired",
        ErrorKind::ImmatureSignature => "Authentication token is not valid yet",
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            "Authentication token has invalid signing method"
        }
        _ => "Authentication token is invalid",
    };
    ValidationError::unauthorized(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::errors::ErrorCode;
    use serde_json::json;

    const SECRET: &str = "test_secret_key_for_token_codec_0001";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET)
    }

    fn rejection(result: AuthResult<VerifiedToken>) -> ValidationError {
        match result {
            Err(AuthError::Validation(err)) => err,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_mints_in_same_instant_differ() {
        let codec = codec();
        let issued_at = Utc::now();

        let first = codec.mint_at(7, issued_at).unwrap();
        let second = codec.mint_at(7, issued_at).unwrap();

        assert_ne!(first, second);
        assert_ne!(codec.decode(&first).unwrap().jti, codec.decode(&second).unwrap().jti);
    }

    #[test]
    fn test_mint_then_verify_round_trip() {
        let codec = codec();
        let token = codec.mint(42).unwrap();

        let verified = codec.verify(&format!("Bearer {token}")).unwrap();
        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.token, token);
    }

    #[test]
    fn test_claims_carry_issuer_and_subject() {
        let codec = codec();
        let token = codec.mint(9).unwrap();
        let claims = codec.decode(&token).unwrap();

        assert_eq!(claims.iss, TOKEN_ISSUER);
        assert_eq!(claims.sub, "user:9");
        assert_eq!(claims.iat, claims.nbf);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_empty_secret_is_config_error() {
        let codec = TokenCodec::new("");
        assert!(matches!(codec.mint(1), Err(AuthError::Config(_))));
        assert!(matches!(codec.verify("Bearer abc"), Err(AuthError::Config(_))));
    }

    #[test]
    fn test_header_shape_rejections() {
        let codec = codec();

        let err = rejection(codec.verify(""));
        assert_eq!(err.message, "No authentication token is provided");

        let err = rejection(codec.verify("bearer abc"));
        assert_eq!(err.message, "Authentication token format is not match");

        let err = rejection(codec.verify("Bearer"));
        assert_eq!(err.message, "Authentication token format is not match");

        let err = rejection(codec.verify("Bearer "));
        assert_eq!(err.message, "Authentication token is empty");

        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.field, "accessToken");
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = rejection(codec().verify("Bearer garbage"));
        assert_eq!(err.message, "Authentication token is malformed");
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = TokenCodec::new("another_secret_key_entirely_000000")
            .mint(5)
            .unwrap();

        let err = rejection(codec().verify(&format!("Bearer {token}")));
        assert_eq!(err.message, "Authentication token is invalid");
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let issued = Utc::now() - Duration::hours(1);
        let token = codec.mint_at(3, issued).unwrap();

        let err = rejection(codec.verify(&format!("Bearer {token}")));
        assert_eq!(err.message, "Authentication token is expired");
    }

    #[test]
    fn test_leeway_tolerates_small_skew() {
        let lenient = codec().with_leeway(120);
        let issued = Utc::now() - Duration::minutes(16);
        let token = lenient.mint_at(3, issued).unwrap();

        assert!(lenient.verify(&format!("Bearer {token}")).is_ok());
        assert!(codec().verify(&format!("Bearer {token}")).is_err());
    }

    #[test]
    fn test_not_yet_valid_token() {
        let codec = codec();
        let issued = Utc::now() + Duration::hours(1);
        let token = codec.mint_at(3, issued).unwrap();

        let err = rejection(codec.verify(&format!("Bearer {token}")));
        assert_eq!(err.message, "Authentication token is not valid yet");
    }

    #[test]
    fn test_foreign_algorithm_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = json!({
            "userId": 1,
            "iss": TOKEN_ISSUER,
            "sub": "user:1",
            "iat": now,
            "nbf": now,
            "exp": now + 600,
            "jti": "b3c1f0de-5a55-4f5e-9a2b-3b7c1d2e4f60",
        });
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = rejection(codec().verify(&format!("Bearer {token}")));
        assert_eq!(err.message, "Authentication token has invalid signing method");
    }

    #[test]
    fn test_unexpected_claims_shape_is_invalid() {
        let now = Utc::now().timestamp();
        let claims = json!({
            "userId": "not-a-number",
            "iss": TOKEN_ISSUER,
            "sub": "user:1",
            "iat": now,
            "nbf": now,
            "exp": now + 600,
            "jti": "b3c1f0de-5a55-4f5e-9a2b-3b7c1d2e4f60",
        });
        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = rejection(codec().verify(&format!("Bearer {token}")));
        assert_eq!(err.message, "Authentication token is invalid");
    }

    #[test]
    fn test_foreign_issuer_is_invalid() {
        let now = Utc::now().timestamp();
        let claims = json!({
            "userId": 1,
            "iss": "someone-else",
            "sub": "user:1",
            "iat": now,
            "nbf": now,
            "exp": now + 600,
            "jti": "b3c1f0de-5a55-4f5e-9a2b-3b7c1d2e4f60",
        });
        let token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = rejection(codec().verify(&format!("Bearer {token}")));
        assert_eq!(err.message, "Authentication token is invalid");
    }

    #[test]
    fn test_mint_pair_fields() {
        let pair = codec().mint_pair(11).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.access_token_expires_in, 900);
        assert_eq!(pair.refresh_token_expires_in, 7 * 24 * 3600);
        assert!(Uuid::parse_str(&pair.refresh_token).is_ok());
    }

    #[test]
    fn test_opaque_tokens_are_unique() {
        assert_ne!(TokenCodec::mint_opaque(), TokenCodec::mint_opaque());
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains(SECRET));
    }
}
