//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use gatekeeper::{cache::CacheConfig, db::DatabaseConfig};
use std::net::SocketAddr;
use std::time::Duration;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address; metrics are off when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Session cache configuration
    pub cache: CacheConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Deadlines
    pub timeouts: TimeoutConfig,
}

/// Security-related configuration
#[derive(Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Password hashing pepper (may be empty)
    pub password_pepper: String,
    /// Access token lifetime in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl_secs: u64,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish_non_exhaustive()
    }
}

/// Request and store deadlines
#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    /// Deadline for a single store call
    pub store_timeout_secs: u64,
    /// Deadline for a whole HTTP request
    pub request_timeout_secs: u64,
}

impl TimeoutConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `redis_url_override` - Optional Redis URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        redis_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr_env("SERVER_BIND")?.unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND)),
        };
        let metrics_bind = parse_addr_env("METRICS_BIND")?;

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let mut cache = CacheConfig::from_env();
        if let Some(url) = redis_url_override {
            cache.redis_url = url;
        }

        // Security configuration (REQUIRED)
        let jwt_secret =
            std::env::var("JWT_SECRET_KEY").map_err(|_| ConfigError::MissingRequired {
                var: "JWT_SECRET_KEY".to_string(),
                hint: "Generate with: openssl rand -hex 32".to_string(),
            })?;

        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET_KEY".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        let security = SecurityConfig {
            jwt_secret,
            password_pepper: std::env::var("PASSWORD_PEPPER").unwrap_or_default(),
            access_token_ttl_secs: parse_env_or("ACCESS_TOKEN_TTL_SECS", 900),
            refresh_token_ttl_secs: parse_env_or("REFRESH_TOKEN_TTL_SECS", 604_800),
        };

        let timeouts = TimeoutConfig {
            store_timeout_secs: parse_env_or("STORE_TIMEOUT_SECS", 5),
            request_timeout_secs: parse_env_or("REQUEST_TIMEOUT_SECS", 15),
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            database,
            cache,
            security,
            timeouts,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.access_token_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "ACCESS_TOKEN_TTL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.security.refresh_token_ttl_secs <= self.security.access_token_ttl_secs {
            return Err(ConfigError::Invalid {
                var: "REFRESH_TOKEN_TTL_SECS".to_string(),
                reason: format!(
                    "Must be greater than access token lifetime ({})",
                    self.security.access_token_ttl_secs
                ),
            });
        }

        if self.timeouts.store_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "STORE_TIMEOUT_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.timeouts.request_timeout_secs < self.timeouts.store_timeout_secs {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS".to_string(),
                reason: format!(
                    "Must be at least the store timeout ({})",
                    self.timeouts.store_timeout_secs
                ),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_addr_env(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{value}' is not a valid IP:PORT address"),
        }),
        Err(_) => Ok(None),
    }
}
