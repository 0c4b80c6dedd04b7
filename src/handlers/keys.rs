//! Dashboard key management handlers.
//!
//! This module implements the key endpoints behind the browser session:
//! - GET /api/keys - List keys and quota usage
//! - POST /api/keys - Mint an additional key
//! - POST /api/keys/regenerate - Revoke every active key and mint one
//! - DELETE /api/keys/:id - Revoke one key

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::session::SessionContext,
    models::api_key::{ApiKeySummary, IssuedKeyResponse, KeyListResponse},
    services::key_service::{self, IssuedKey},
    state::AppState,
};

fn issued_response(issued: IssuedKey) -> IssuedKeyResponse {
    IssuedKeyResponse {
        api_key: issued.plaintext,
        key: ApiKeySummary::from(issued.record),
    }
}

/// List the principal's keys.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "keys": [
///     { "id": "...", "key_prefix": "s1c_3f9a", "is_active": true, "created_at": "..." }
///   ],
///   "active_count": 1,
///   "max_active_keys": 3,
///   "can_issue": false
/// }
/// ```
///
/// Digests and plaintexts are never included.
pub async fn list_keys(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<KeyListResponse>, AppError> {
    let listing =
        key_service::list(&*state.store, &state.guard, session.principal.id, Utc::now()).await?;
    Ok(Json(listing))
}

/// Mint a new key.
///
/// # Response
///
/// - **201 Created**: `{ "api_key": "s1c_...", "id": ..., "key_prefix": ..., ... }`.
///   The `api_key` is shown this one time only.
/// - **429**: max active keys reached or cooldown in effect
pub async fn create_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<(StatusCode, Json<IssuedKeyResponse>), AppError> {
    let issued = key_service::issue(
        &*state.store,
        &state.guard,
        &state.config.api_key_prefix,
        session.principal.id,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(issued_response(issued))))
}

/// Revoke all active keys and mint a replacement in one step.
pub async fn regenerate_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<(StatusCode, Json<IssuedKeyResponse>), AppError> {
    let issued = key_service::revoke_all_and_issue(
        &*state.store,
        &state.guard,
        &state.config.api_key_prefix,
        session.principal.id,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(issued_response(issued))))
}

/// Revoke one key (soft delete).
///
/// # Response
///
/// - **204 No Content** on success
/// - **400** if the id is not a UUID
/// - **404** if the key is unknown, already revoked, or owned by someone else
pub async fn revoke_key(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    key_id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(key_id) = key_id?;
    key_service::revoke(&*state.store, session.principal.id, key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
