//! Authorization code models for the editor OAuth handoff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::principal::Tier;

/// Stored authorization artifact.
///
/// # Database Table
///
/// Maps to `oauth_codes`. Only the digest of the code is stored; a row is
/// deleted the moment a redemption looks it up.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthorizationCode {
    pub hashed_code: String,
    pub owner_id: Uuid,

    /// S256 challenge supplied at initiation
    pub code_challenge: String,
    pub state: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Query string of `GET /api/auth/vscode/initiate`.
///
/// All fields are optional here so missing ones surface as a 400 with a useful message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitiateParams {
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Body of `POST /api/auth/vscode/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
}

/// Successful code redemption.
///
/// # JSON Example
///
/// ```json
/// {
///   "access_token": "s1c_9c1e...",
///   "token_type": "Bearer",
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "email": "dev@example.com",
///   "tier": "professional",
///   "plan": "Professional"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// A freshly minted API key. Shown once.
    pub access_token: String,
    pub token_type: &'static str,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub tier: Tier,
    pub plan: String,
    pub unlimited: bool,
}
