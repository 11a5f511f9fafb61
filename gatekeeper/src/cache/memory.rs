//! In-process [`KeyValueCache`] with TTL, for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::KeyValueCache;
use crate::auth::{AuthError, AuthResult};

#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    gets: Arc<AtomicUsize>,
    sets: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get` calls served so far
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls served so far
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of keys that have not expired yet
    pub fn live_keys(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|(_, exp)| *exp > now).count())
            .unwrap_or_default()
    }
}

fn poisoned<T>(_: T) -> AuthError {
    AuthError::StoreUnavailable("session cache mutex poisoned".to_string())
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let mut entries = self.entries.lock().map_err(poisoned)?;

        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > now => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn ping(&self) -> AuthResult<()> {
        Ok(())
    }
}
