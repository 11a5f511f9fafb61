//! Session credential server.
//!
//! Serves registration, login and the gated profile endpoint over HTTP, with
//! accounts in PostgreSQL and live sessions in Redis.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use gatekeeper::{
    auth::{AuthManager, CredentialVerifier, TokenCodec},
    cache::RedisCache,
    db::{Database, PgAccountRepository},
};
use gk_server::{api, config::ServerConfig, logging, metrics};
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Run the gatekeeper session server

USAGE:
  gk_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --redis-url  URL         Redis connection string     [default: env REDIS_URL or redis://127.0.0.1:6379]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  REDIS_URL                Redis connection string
  JWT_SECRET_KEY           JWT signing secret (required, at least 32 characters)
  PASSWORD_PEPPER          Password hashing pepper
  ACCESS_TOKEN_TTL_SECS    Access token lifetime   [default: 900]
  REFRESH_TOKEN_TTL_SECS   Refresh token lifetime  [default: 604800]
  STORE_TIMEOUT_SECS       Per store call deadline [default: 5]
  REQUEST_TIMEOUT_SECS     Per request deadline    [default: 15]
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  (See .env file for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        redis_url: pargs.opt_value_from_str("--redis-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.redis_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exported on {}", addr);
    }

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    db.ensure_schema()
        .await
        .context("Failed to create database schema")?;
    info!("Database connected successfully");

    info!("Connecting to session cache");
    let cache = RedisCache::connect(&config.cache)
        .await
        .context("Failed to connect to Redis")?;
    info!("Session cache connected successfully");

    let access_ttl = token_lifetime(config.security.access_token_ttl_secs)
        .context("ACCESS_TOKEN_TTL_SECS is out of range")?;
    let refresh_ttl = token_lifetime(config.security.refresh_token_ttl_secs)
        .context("REFRESH_TOKEN_TTL_SECS is out of range")?;
    let tokens =
        TokenCodec::new(config.security.jwt_secret.clone()).with_lifetimes(access_ttl, refresh_ttl);

    let auth_manager = AuthManager::new(
        Arc::new(PgAccountRepository::new(db.pool().clone())),
        Arc::new(cache),
        tokens,
        CredentialVerifier::new(config.security.password_pepper.clone()),
    )
    .with_store_timeout(config.timeouts.store_timeout());

    let app = api::create_router(
        api::AppState::new(auth_manager),
        config.timeouts.request_timeout(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

fn token_lifetime(secs: u64) -> Option<chrono::Duration> {
    chrono::Duration::try_seconds(i64::try_from(secs).ok()?)
}

/// Graceful shutdown signal: Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
