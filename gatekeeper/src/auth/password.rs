//! Password hashing with Argon2id and an optional server-side pepper.

use super::errors::{AuthError, AuthResult, CredentialFailure};
use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use std::fmt;

/// One-way hashing and verification of account passwords.
#[derive(Clone, Default)]
pub struct CredentialVerifier {
    pepper: String,
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// Create a verifier. The pepper is appended to every password before
    /// hashing and may be empty.
    pub fn new(pepper: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    fn peppered(&self, password: &str) -> String {
        format!("{}{}", password, self.pepper)
    }

    /// Hash password with Argon2id + pepper
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(self.peppered(password).as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against hash
    ///
    /// A mismatch is [`CredentialFailure::PasswordMismatch`]; a stored hash
    /// that cannot be parsed is an infrastructure error.
    pub fn compare(&self, hash: &str, password: &str) -> AuthResult<()> {
        let parsed = PasswordHash::new(hash).map_err(|_| AuthError::HashingFailed)?;

        match Argon2::default().verify_password(self.peppered(password).as_bytes(), &parsed) {
            Ok(()) => Ok(()),
            Err(PasswordHashError::Password) => {
                Err(AuthError::Credentials(CredentialFailure::PasswordMismatch))
            }
            Err(_) => Err(AuthError::HashingFailed),
        }
    }

    /// [`hash`](Self::hash) on the blocking pool.
    pub async fn hash_blocking(&self, password: String) -> AuthResult<String> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|_| AuthError::HashingFailed)?
    }

    /// [`compare`](Self::compare) on the blocking pool.
    pub async fn compare_blocking(&self, hash: String, password: String) -> AuthResult<()> {
        let verifier = self.clone();
        tokio::task::spawn_blocking(move || verifier.compare(&hash, &password))
            .await
            .map_err(|_| AuthError::HashingFailed)?
    }
}
