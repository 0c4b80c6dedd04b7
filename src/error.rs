//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::services::guard::Denial;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Client Errors**: Malformed input, never retried
/// - **Authentication Failures**: Bad, revoked or expired credentials. Messages stay
///   vague so callers cannot tell a revoked key from one that never existed
/// - **Quota Errors**: Issuance denied by the guard, recoverable after a wait
/// - **Service Errors**: Store or identity provider unreachable, safe to retry
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// Returns HTTP 503 so clients retry with backoff.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The identity provider could not be reached or answered unexpectedly.
    #[error("Identity provider error: {0}")]
    Identity(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// No API key was presented in either supported header.
    #[error("Missing API key. Provide either Authorization: Bearer <key> or x-api-key: <key>")]
    MissingApiKey,

    /// Presented token does not look like one of our keys. Rejected before any store access.
    #[error("Invalid API key format")]
    MalformedApiKey,

    /// API key is unknown or revoked.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key. Please check your key or generate a new one from the dashboard.")]
    InvalidApiKey,

    /// No browser session, or the identity provider rejected it.
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid authorization code")]
    InvalidAuthorizationCode,

    #[error("Authorization code expired")]
    AuthorizationCodeExpired,

    #[error("Invalid code_verifier")]
    PkceMismatch,

    /// Key does not exist, is already revoked, or belongs to someone else.
    #[error("API key not found")]
    KeyNotFound,

    /// The issuance guard refused to mint another key.
    ///
    /// Returns HTTP 429 with a `Retry-After` header when a wait is known.
    #[error("{0}")]
    QuotaExceeded(Denial),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

// Extractor rejections get the same JSON body as every other failure

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Quota errors additionally carry `retry_after_secs` or `max_active_keys`.
///
/// # Status Code Mapping
///
/// - `InvalidRequest`, `MalformedApiKey` → 400 Bad Request
/// - `MissingApiKey`, `InvalidApiKey`, `Unauthenticated`, code and PKCE failures → 401 Unauthorized
/// - `KeyNotFound` → 404 Not Found
/// - `QuotaExceeded` → 429 Too Many Requests
/// - `Database`, `Identity`, `ServiceUnavailable` → 503 (hides details from client)
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::MalformedApiKey => (
                StatusCode::BAD_REQUEST,
                "malformed_api_key",
                self.to_string(),
            ),
            AppError::MissingApiKey => (
                StatusCode::UNAUTHORIZED,
                "missing_api_key",
                self.to_string(),
            ),
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                self.to_string(),
            ),
            AppError::InvalidAuthorizationCode => {
                (StatusCode::UNAUTHORIZED, "invalid_grant", self.to_string())
            }
            AppError::AuthorizationCodeExpired => {
                (StatusCode::UNAUTHORIZED, "expired_grant", self.to_string())
            }
            AppError::PkceMismatch => (
                StatusCode::UNAUTHORIZED,
                "invalid_code_verifier",
                self.to_string(),
            ),
            AppError::KeyNotFound => (StatusCode::NOT_FOUND, "key_not_found", self.to_string()),
            AppError::QuotaExceeded(ref denial) => return quota_response(denial),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                unavailable()
            }
            AppError::Identity(ref e) => {
                tracing::error!("Identity provider error: {:?}", e);
                unavailable()
            }
            AppError::ServiceUnavailable(ref msg) => {
                tracing::error!("Service unavailable: {}", msg);
                unavailable()
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn unavailable() -> (StatusCode, &'static str, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "service_unavailable",
        "Service temporarily unavailable, please retry".to_string(),
    )
}

fn quota_response(denial: &Denial) -> Response {
    let detail = match denial {
        Denial::MaxActiveKeys { max } => json!({ "max_active_keys": max }),
        Denial::Cooldown { .. } => json!({ "retry_after_secs": denial.retry_after_secs() }),
    };

    let body = Json(json!({
        "error": {
            "code": "quota_exceeded",
            "message": denial.to_string(),
            "detail": detail
        }
    }));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    if let Some(secs) = denial.retry_after_secs() {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
