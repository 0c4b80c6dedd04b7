//! Browser session middleware for dashboard routes.
//!
//! Resolves the identity provider's session cookie into a [`Principal`],
//! mirrors it into the profile table and injects [`SessionContext`].

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, identity, models::principal::Principal, state::AppState};

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub principal: Principal,
}

/// Principal behind the request's session cookie, if any.
///
/// A principal seen for the first time is recorded in the profile table.
pub async fn current_principal(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Principal>, AppError> {
    let Some(token) = identity::session_token(headers, &state.config.session_cookie) else {
        return Ok(None);
    };

    let Some(principal) = state.identity.session_user(token).await? else {
        return Ok(None);
    };

    state.store.upsert_principal(&principal).await?;
    Ok(Some(principal))
}

/// Reject requests without a live browser session with 401.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = current_principal(&state, request.headers())
        .await?
        .ok_or(AppError::Unauthenticated)?;

    request.extensions_mut().insert(SessionContext { principal });

    Ok(next.run(request).await)
}
