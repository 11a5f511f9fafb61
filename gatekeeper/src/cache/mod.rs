//! Session Store: the per-user token slot in the external cache.
//!
//! [`KeyValueCache`] is the raw `SET key value EX ttl` / `GET key` surface.
//! [`SessionStore`] layers the session rules on top: one access slot and one
//! refresh slot per user, and a new pair always overwrites the old one. That
//! overwrite is what retires earlier sessions; nothing is revoked explicitly.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthResult, TokenPair, UserId};

pub mod config;
pub mod memory;
pub mod redis_cache;

pub use config::CacheConfig;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// Minimal key-value cache with per-key expiry
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()>;

    /// Fetch the value under `key`; `None` on a miss or after expiry
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Check the cache is reachable
    async fn ping(&self) -> AuthResult<()>;
}

/// Single-slot-per-user token store.
///
/// At most one access token and one refresh token are live per user: writing
/// a new pair makes the previous one unreachable immediately.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn KeyValueCache>,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn KeyValueCache>) -> Self {
        Self { cache }
    }

    pub fn access_key(user_id: UserId) -> String {
        format!("auth:accessToken:{user_id}")
    }

    pub fn refresh_key(user_id: UserId) -> String {
        format!("auth:refreshToken:{user_id}")
    }

    /// Make `pair` the user's only live session.
    ///
    /// Each slot expires with its token: the access slot after
    /// `access_token_expires_in`, the refresh slot after
    /// `refresh_token_expires_in`.
    pub async fn replace(&self, user_id: UserId, pair: &TokenPair) -> AuthResult<()> {
        self.cache
            .set(
                &Self::access_key(user_id),
                &pair.access_token,
                ttl_from_secs(pair.access_token_expires_in),
            )
            .await?;

        self.cache
            .set(
                &Self::refresh_key(user_id),
                &pair.refresh_token,
                ttl_from_secs(pair.refresh_token_expires_in),
            )
            .await?;

        tracing::debug!(user_id, "session slot replaced");
        Ok(())
    }

    /// Currently live access token for `user_id`
    pub async fn access_token(&self, user_id: UserId) -> AuthResult<Option<String>> {
        self.cache.get(&Self::access_key(user_id)).await
    }

    /// Currently live refresh token for `user_id`
    pub async fn refresh_token(&self, user_id: UserId) -> AuthResult<Option<String>> {
        self.cache.get(&Self::refresh_key(user_id)).await
    }

    pub async fn ping(&self) -> AuthResult<()> {
        self.cache.ping().await
    }
}

fn ttl_from_secs(secs: i64) -> Duration {
    Duration::from_secs(u64::try_from(secs).unwrap_or(0).max(1))
}
