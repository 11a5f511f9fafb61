//! User profile handlers. Every route here sits behind the request gate.

use axum::{
    Json,
    extract::{Extension, State},
};
use gatekeeper::auth::UserProfile;

use super::{AppState, error::ApiError, middleware::AuthenticatedUser};

/// Profile of the authenticated caller.
///
/// # Response
///
/// ```json
/// {
///   "id": 1,
///   "username": "alice",
///   "email": "alice@example.com",
///   "createdAt": "2025-01-01T00:00:00Z",
///   "updatedAt": "2025-01-01T00:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: token rejected by the gate, or the account is gone
/// - `500 Internal Server Error`: store failure
pub async fn me(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user_id)): Extension<AuthenticatedUser>,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .auth_manager
        .get_user_info(user_id)
        .await
        .map(Json)
        .map_err(ApiError::protected)
}
