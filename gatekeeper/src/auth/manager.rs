//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult, AuthResultExt, CredentialFailure, ErrorCode, ValidationError},
    gate::RequestGate,
    models::{LoginRequest, NewUser, RegisterRequest, TokenPair, UserId, UserProfile},
    password::CredentialVerifier,
    token::TokenCodec,
};
use crate::cache::{KeyValueCache, SessionStore};
use crate::db::{AccountRepository, AccountTransaction, duplicate_field};
use crate::timeouts::{DEFAULT_STORE_TIMEOUT, with_timeout};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Reachability of the two external stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealth {
    pub database: bool,
    pub cache: bool,
}

impl StoreHealth {
    pub fn is_healthy(&self) -> bool {
        self.database && self.cache
    }
}

/// Authentication manager
///
/// Owns handles to the Account Store and Session Store and orchestrates
/// registration, login and profile lookup. Cheap to clone.
#[derive(Clone)]
pub struct AuthManager {
    accounts: Arc<dyn AccountRepository>,
    sessions: SessionStore,
    tokens: TokenCodec,
    passwords: CredentialVerifier,
    store_timeout: Duration,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account Store
    /// * `cache` - backing cache for the Session Store
    /// * `tokens` - access token codec holding the signing secret
    /// * `passwords` - password hasher holding the pepper
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        cache: Arc<dyn KeyValueCache>,
        tokens: TokenCodec,
        passwords: CredentialVerifier,
    ) -> Self {
        Self {
            accounts,
            sessions: SessionStore::new(cache),
            tokens,
            passwords,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Deadline applied to every store call
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Gate for protected routes, sharing this manager's codec and cache.
    pub fn gate(&self) -> RequestGate {
        RequestGate::new(self.tokens.clone(), self.sessions.clone())
            .with_store_timeout(self.store_timeout)
    }

    /// Register a new user and open their first session
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - bad field shape, or username/email taken
    /// * infrastructure variants - store, hashing or signing failures
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<TokenPair> {
        validate_registration(&request)?;

        let taken = with_timeout(
            "account uniqueness check",
            self.store_timeout,
            self.accounts
                .find_by_username_or_email(&request.username, &request.email),
        )
        .await
        .context("register")?;

        if let Some(field) = taken {
            tracing::info!(field = field.as_str(), "registration rejected: duplicate account");
            return Err(duplicate_field(field).into());
        }

        let password_hash = self
            .passwords
            .hash_blocking(request.password)
            .await
            .context("register")?;

        let now = Utc::now();
        let new_user = NewUser {
            username: request.username,
            email: request.email,
            password_hash,
            created_at: now,
            updated_at: now,
        };

        let mut tx = with_timeout("begin transaction", self.store_timeout, self.accounts.begin())
            .await
            .context("register")?;

        let inserted = with_timeout(
            "insert account",
            self.store_timeout,
            tx.insert_user(&new_user),
        )
        .await;
        let user_id = match inserted {
            Ok(id) => id,
            Err(err) => return self.abort(tx, err).await.context("register"),
        };

        let pair = match self.tokens.mint_pair(user_id) {
            Ok(pair) => pair,
            Err(err) => return self.abort(tx, err).await.context("register"),
        };

        with_timeout("commit transaction", self.store_timeout, tx.commit())
            .await
            .context("register")?;

        self.open_session(user_id, &pair).await.context("register")?;

        tracing::info!(user_id, username = %new_user.username, "user registered");
        Ok(pair)
    }

    /// Log a user in, replacing any session they already had
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - bad field shape
    /// * `AuthError::Credentials` - unknown email or wrong password; both
    ///   render as the same client-visible error
    pub async fn login(&self, request: LoginRequest) -> AuthResult<TokenPair> {
        validate_email(&request.email)?;
        validate_password(&request.password)?;

        let credentials = with_timeout(
            "credential lookup",
            self.store_timeout,
            self.accounts.find_credentials_by_email(&request.email),
        )
        .await
        .context("login")?;

        let Some(credentials) = credentials else {
            tracing::warn!(reason = %CredentialFailure::UnknownEmail, "login refused");
            return Err(AuthError::Credentials(CredentialFailure::UnknownEmail));
        };

        if let Err(err) = self
            .passwords
            .compare_blocking(credentials.password_hash, request.password)
            .await
        {
            if let AuthError::Credentials(reason) = &err {
                tracing::warn!(user_id = credentials.user_id, reason = %reason, "login refused");
            }
            return Err::<TokenPair, _>(err).context("login");
        }

        let pair = self.tokens.mint_pair(credentials.user_id).context("login")?;
        self.open_session(credentials.user_id, &pair)
            .await
            .context("login")?;

        tracing::info!(user_id = credentials.user_id, "user logged in");
        Ok(pair)
    }

    /// Fetch the public profile of `user_id`
    pub async fn get_user_info(&self, user_id: UserId) -> AuthResult<UserProfile> {
        let profile = with_timeout(
            "profile lookup",
            self.store_timeout,
            self.accounts.find_by_id(user_id),
        )
        .await
        .context("get user info")?;

        profile.ok_or_else(|| {
            ValidationError::new(ErrorCode::NotFound, "User not found", "userId").into()
        })
    }

    /// Ping both stores. Never fails; failures are logged and reported as
    /// `false`.
    pub async fn health_check(&self) -> StoreHealth {
        let (database, cache) = tokio::join!(
            with_timeout("database ping", self.store_timeout, self.accounts.ping()),
            with_timeout("cache ping", self.store_timeout, self.sessions.ping()),
        );

        if let Err(err) = &database {
            tracing::error!(error = %err, "database health check failed");
        }
        if let Err(err) = &cache {
            tracing::error!(error = %err, "cache health check failed");
        }

        StoreHealth {
            database: database.is_ok(),
            cache: cache.is_ok(),
        }
    }

    async fn open_session(&self, user_id: UserId, pair: &TokenPair) -> AuthResult<()> {
        with_timeout(
            "session write",
            self.store_timeout,
            self.sessions.replace(user_id, pair),
        )
        .await
    }

    /// Roll back a registration, keeping the error that caused it.
    async fn abort<T>(&self, tx: Box<dyn AccountTransaction>, err: AuthError) -> AuthResult<T> {
        if let Err(rollback_err) =
            with_timeout("rollback transaction", self.store_timeout, tx.rollback()).await
        {
            tracing::error!(error = %rollback_err, "failed to roll back registration");
        }
        Err(err)
    }
}

fn check_length(
    value: &str,
    field: &str,
    min: usize,
    max: usize,
    messages: [&str; 3],
) -> Result<(), ValidationError> {
    let [empty, too_short, too_long] = messages;
    let len = value.chars().count();

    if len == 0 {
        return Err(ValidationError::invalid(field, empty));
    }
    if len < min {
        return Err(ValidationError::invalid(field, too_short));
    }
    if len > max {
        return Err(ValidationError::invalid(field, too_long));
    }
    Ok(())
}

/// Username: 4 to 22 characters
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    check_length(
        username,
        "username",
        4,
        22,
        [
            "Username is required to not be empty",
            "Username must be at least 4 characters",
            "Username must be at most 22 characters",
        ],
    )
}

/// Email: 16 to 80 characters
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    check_length(
        email,
        "email",
        16,
        80,
        [
            "Email is required to not be empty",
            "Email must be at least 16 characters",
            "Email must be at most 80 characters",
        ],
    )
}

/// Password: 5 to 20 characters
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    check_length(
        password,
        "password",
        5,
        20,
        [
            "Password is required to not be empty",
            "Password must be at least 5 characters",
            "Password must be at most 20 characters",
        ],
    )
}

/// Check a registration payload field by field, stopping at the first error.
pub fn validate_registration(request: &RegisterRequest) -> Result<(), ValidationError> {
    validate_username(&request.username)?;
    validate_email(&request.email)?;
    validate_password(&request.password)
}
