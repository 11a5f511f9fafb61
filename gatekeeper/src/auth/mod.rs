//! Authentication: registration, login and bearer-token validation.
//!
//! - [`token`]: HS256 access tokens and opaque refresh tokens
//! - [`password`]: Argon2id hashing with an optional server-side pepper
//! - [`manager`]: the registration/login service
//! - [`gate`]: the per-request check for protected routes
//!
//! A bearer token is live only while it is the token cached for its user, so a
//! successful login retires every token issued before it.
//!
//! ## Example
//!
//! ```no_run
//! use gatekeeper::auth::{AuthManager, CredentialVerifier, RegisterRequest, TokenCodec};
//! use gatekeeper::cache::MemoryCache;
//! use gatekeeper::db::MemoryAccountRepository;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = AuthManager::new(
//!         Arc::new(MemoryAccountRepository::new()),
//!         Arc::new(MemoryCache::new()),
//!         TokenCodec::new("a-signing-secret-of-at-least-32-bytes"),
//!         CredentialVerifier::new("pepper"),
//!     );
//!
//!     let pair = auth
//!         .register(RegisterRequest {
//!             username: "alice".to_string(),
//!             email: "alice@example.com".to_string(),
//!             password: "hunter22".to_string(),
//!         })
//!         .await?;
//!
//!     let user_id = auth
//!         .gate()
//!         .validate_bearer(&format!("Bearer {}", pair.access_token))
//!         .await?;
//!     println!("{:?}", auth.get_user_info(user_id).await?);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod gate;
pub mod manager;
pub mod models;
pub mod password;
pub mod token;

pub use errors::{
    AuthError, AuthResult, AuthResultExt, CredentialFailure, ErrorCode, ValidationError,
};
pub use gate::{GateRejection, GateStage, RequestGate};
pub use manager::{
    AuthManager, StoreHealth, validate_email, validate_password, validate_registration,
    validate_username,
};
pub use models::{
    AccessTokenClaims, Credentials, LoginRequest, NewUser, RegisterRequest, TOKEN_TYPE,
    TokenPair, UniqueField, UserId, UserProfile,
};
pub use password::CredentialVerifier;
pub use token::{TokenCodec, VerifiedToken, extract_bearer};
