//! API key authentication middleware.
//!
//! This middleware intercepts requests from the editor extension to:
//! 1. Extract the API key from `Authorization: Bearer` or `x-api-key`
//! 2. Validate it (format, digest lookup, entitlement)
//! 3. Inject [`ApiKeyContext`] into the request
//! 4. Reject unauthorized requests with HTTP 400/401

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError, models::principal::ValidatedUser, services::validation_service,
    state::AppState,
};

/// Header carrying the key when `Authorization` is not used.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication context attached to requests authenticated by API key.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub user: ValidatedUser,
}

/// Presented key, preferring `Authorization: Bearer <key>` over `x-api-key: <key>`.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(API_KEY_HEADER)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
        })
        .filter(|key| !key.is_empty())
}

/// API key authentication middleware function.
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError::MissingApiKey)` if no key was presented (401)
/// - `Err(AppError::MalformedApiKey)` if the key has the wrong shape (400)
/// - `Err(AppError::InvalidApiKey)` if no active key matches (401)
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = presented_key(request.headers())
        .map(str::to_owned)
        .ok_or(AppError::MissingApiKey)?;

    let user = validation_service::validate(
        &*state.store,
        &state.config.accepted_prefixes(),
        &state.entitlements,
        &api_key,
    )
    .await?;

    // Route handlers can now extract this using Extension<ApiKeyContext>
    request.extensions_mut().insert(ApiKeyContext { user });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_wins_over_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s1c_a"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("s1c_b"));
        assert_eq!(presented_key(&headers), Some("s1c_a"));
    }

    #[test]
    fn falls_back_to_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("s1c_b"));
        assert_eq!(presented_key(&headers), Some("s1c_b"));
    }

    #[test]
    fn empty_headers_present_nothing() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_key(&headers), None);
        headers.insert(API_KEY_HEADER, HeaderValue::from_static(""));
        assert_eq!(presented_key(&headers), None);
    }
}
