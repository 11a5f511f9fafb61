//! Repository trait definitions for the Account Store.
//!
//! These traits are the only view of the relational store the auth service
//! has: insert inside a transaction, a uniqueness check, a credential lookup
//! and a profile lookup.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::auth::{
    AuthError, AuthResult, Credentials, NewUser, UniqueField, UserId, UserProfile,
    ValidationError,
};

/// A write transaction on the Account Store.
///
/// Dropping a transaction without calling [`commit`](Self::commit) discards
/// everything it staged.
#[async_trait]
pub trait AccountTransaction: Send {
    /// Insert an account and return its generated id
    async fn insert_user(&mut self, user: &NewUser) -> AuthResult<UserId>;

    /// Make the staged writes durable
    async fn commit(self: Box<Self>) -> AuthResult<()>;

    /// Discard the staged writes
    async fn rollback(self: Box<Self>) -> AuthResult<()>;
}

/// Trait for account repository operations
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Start a write transaction
    async fn begin(&self) -> AuthResult<Box<dyn AccountTransaction>>;

    /// Report which field, if any, an existing account already uses.
    /// Username collisions win when both match.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> AuthResult<Option<UniqueField>>;

    /// Fetch the id and password hash registered for `email`
    async fn find_credentials_by_email(&self, email: &str) -> AuthResult<Option<Credentials>>;

    /// Fetch the public profile for `user_id`
    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<UserProfile>>;

    /// Check the store is reachable
    async fn ping(&self) -> AuthResult<()>;
}

/// Validation error for an account that already uses `field`.
pub fn duplicate_field(field: UniqueField) -> ValidationError {
    match field {
        UniqueField::Username => {
            ValidationError::invalid(field.as_str(), "Username is already exist")
        }
        UniqueField::Email => ValidationError::invalid(field.as_str(), "Email is already exist"),
    }
}

/// Default PostgreSQL implementation of `AccountRepository`
#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// PostgreSQL transaction handed out by [`PgAccountRepository::begin`]
pub struct PgAccountTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AccountTransaction for PgAccountTransaction {
    async fn insert_user(&mut self, user: &NewUser) -> AuthResult<UserId> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email, password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(unique_violation)?;

        Ok(row.get("id"))
    }

    async fn commit(self: Box<Self>) -> AuthResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AuthResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// A concurrent registration can slip past the uniqueness check; the table
/// constraints still catch it and the caller gets the same validation error.
fn unique_violation(err: sqlx::Error) -> AuthError {
    let field = err
        .as_database_error()
        .filter(|db| db.is_unique_violation())
        .and_then(|db| db.constraint())
        .and_then(|constraint| match constraint {
            "users_username_key" => Some(UniqueField::Username),
            "users_email_key" => Some(UniqueField::Email),
            _ => None,
        });

    match field {
        Some(field) => AuthError::Validation(duplicate_field(field)),
        None => AuthError::Database(err),
    }
}

/// Username matches sort first so they win when another row holds the email
const COLLISION_QUERY: &str = "SELECT username, email FROM users \
     WHERE username = $1 OR email = $2 \
     ORDER BY (username = $1) DESC LIMIT 1";

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn begin(&self) -> AuthResult<Box<dyn AccountTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAccountTransaction { tx }))
    }

    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> AuthResult<Option<UniqueField>> {
        let row = sqlx::query(COLLISION_QUERY)
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            let existing_username: String = r.get("username");
            let existing_email: String = r.get("email");
            if existing_username == username {
                Some(UniqueField::Username)
            } else if existing_email == email {
                Some(UniqueField::Email)
            } else {
                None
            }
        }))
    }

    async fn find_credentials_by_email(&self, email: &str) -> AuthResult<Option<Credentials>> {
        let row = sqlx::query("SELECT id, password FROM users WHERE email = $1 LIMIT 1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Credentials {
            user_id: r.get("id"),
            password_hash: r.get("password"),
        }))
    }

    async fn find_by_id(&self, user_id: UserId) -> AuthResult<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT id, username, email, created_at, updated_at FROM users WHERE id = $1 LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| UserProfile {
            id: r.get("id"),
            username: r.get("username"),
            email: r.get("email"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    async fn ping(&self) -> AuthResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
