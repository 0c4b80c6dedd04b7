//! API key validation endpoint used by the editor extension.

use axum::{
    Extension, Json,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::{middleware::auth::ApiKeyContext, models::principal::ValidationResponse};

/// Validate the presented API key.
///
/// # Endpoint
///
/// `POST /api/auth/validate`
///
/// # Headers
///
/// `Authorization: Bearer s1c_...` or `x-api-key: s1c_...`
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "valid": true,
///   "user": {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "email": "dev@example.com",
///     "full_name": "dev",
///     "tier": "professional",
///     "plan": "Professional",
///     "subscription_status": "active",
///     "unlimited": false
///   }
/// }
/// ```
///
/// Validation itself happens in the API key middleware; failures never reach
/// this handler. Responses are marked `no-store` so entitlement changes apply
/// on the next call.
pub async fn validate_key(Extension(auth): Extension<ApiKeyContext>) -> Response {
    let mut response = Json(ValidationResponse {
        valid: true,
        user: auth.user,
    })
    .into_response();

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
