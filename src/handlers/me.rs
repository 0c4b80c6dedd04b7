//! Current user endpoint.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    middleware::session::SessionContext,
    models::principal::{MeResponse, ValidatedUser},
    state::AppState,
};

/// Identity and entitlement of the logged-in browser user.
///
/// `GET /api/auth/me`. Useful for finding the id to configure as the special user.
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Response, AppError> {
    let id = session.principal.id;
    let profile = state.store.find_profile(id).await?;
    let entitlement = state.entitlements.resolve(id, profile.as_ref());

    let mut user = ValidatedUser::new(id, profile.as_ref(), entitlement);
    if user.email.is_none() {
        user.email = session.principal.email;
    }

    let mut response = Json(MeResponse {
        user,
        created_at: profile.map(|p| p.created_at),
    })
    .into_response();

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
