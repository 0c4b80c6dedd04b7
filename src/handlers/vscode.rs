//! Editor OAuth handoff endpoints.
//!
//! - GET /api/auth/vscode/initiate - browser leg, ends in a custom-URI redirect
//! - POST /api/auth/vscode/token - extension leg, exchanges code + verifier for a key

use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::HeaderMap,
    response::Redirect,
};
use chrono::Utc;

use crate::{
    error::AppError,
    middleware::session,
    models::oauth::{InitiateParams, TokenRequest, TokenResponse},
    services::oauth_service::{self, InitiateOutcome},
    state::AppState,
};

/// Start the editor authorization.
///
/// # Query Parameters
///
/// - `state`: opaque value echoed back to the extension
/// - `code_challenge`: base64url(SHA-256(code_verifier))
/// - `code_challenge_method`: must be `S256`
///
/// # Response
///
/// - **307** to the login page when no session exists; login sends the browser back here
/// - **307** to `vscode://.../callback?code=...&state=...` once a code is issued
/// - **400** for missing or malformed parameters
pub async fn initiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<InitiateParams>, QueryRejection>,
) -> Result<Redirect, AppError> {
    let Query(params) = params?;
    let principal = session::current_principal(&state, &headers).await?;

    let outcome = oauth_service::initiate(
        &*state.store,
        &state.config,
        principal.as_ref(),
        params,
        Utc::now(),
    )
    .await?;

    if let InitiateOutcome::LoginRequired { .. } = outcome {
        tracing::debug!("No session, redirecting editor authorization through login");
    }

    Ok(Redirect::temporary(outcome.location()))
}

/// Exchange an authorization code for an API key.
///
/// # Request Body
///
/// ```json
/// {
///   "code": "q3N...",
///   "code_verifier": "dBj..."
/// }
/// ```
///
/// # Response
///
/// - **200**: [`TokenResponse`] with a freshly minted key as `access_token`
/// - **400**: body missing, not JSON, or sent without `Content-Type: application/json`
/// - **401**: invalid, expired or already used code, or PKCE mismatch
/// - **429**: issuance guard refused a new key
pub async fn token(
    State(state): State<AppState>,
    request: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(request) = request?;
    let response = oauth_service::redeem(
        &*state.store,
        &state.config,
        &state.guard,
        &state.entitlements,
        request,
        Utc::now(),
    )
    .await?;

    Ok(Json(response))
}
