//! Deadline helpers for store access.
//!
//! Every Account Store and Session Store call made by the auth service goes
//! through [`with_timeout`], so a hung connection surfaces as an
//! infrastructure error instead of stalling the request.

use crate::auth::{AuthError, AuthResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default deadline for a single store call (5 seconds)
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `future` with a deadline.
///
/// # Example
///
/// ```no_run
/// use gatekeeper::timeouts::{with_timeout, DEFAULT_STORE_TIMEOUT};
/// # use gatekeeper::db::{AccountRepository, MemoryAccountRepository};
/// # async fn example(repo: MemoryAccountRepository) -> gatekeeper::auth::AuthResult<()> {
///
/// let profile = with_timeout("find profile", DEFAULT_STORE_TIMEOUT, repo.find_by_id(1)).await?;
/// # let _ = profile;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(operation: &'static str, duration: Duration, future: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(AuthError::Timeout {
            operation,
            duration,
        }),
    }
}
