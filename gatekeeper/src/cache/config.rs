//! Session cache configuration.

use std::env;

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis connection URL
    pub redis_url: String,
}

impl CacheConfig {
    /// Read `REDIS_URL`, falling back to a local instance
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| Self::development().redis_url),
        }
    }

    pub fn development() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::development()
    }
}
