//! API Key model for authentication.
//!
//! API keys authenticate the editor extension. They are stored in the database as
//! SHA-256 hashes; the plaintext is shown to the user exactly once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `owner_id`: Principal the key belongs to
/// - `key_prefix`: Display slice of the plaintext (e.g. `s1c_3f9a`)
/// - `hashed_key`: SHA-256 hash of the actual API key
/// - `is_active`: Whether the key is currently valid
/// - `created_at`: When the key was created
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub owner_id: Uuid,

    /// Non-secret, used to narrow lookups and label keys in the dashboard.
    /// Never used for authorization on its own.
    pub key_prefix: String,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub hashed_key: String,

    /// Whether this API key is currently active
    ///
    /// Revocation clears this flag; rows are never deleted.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

/// A key about to be inserted.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub owner_id: Uuid,
    pub key_prefix: String,
    pub hashed_key: String,
    pub created_at: DateTime<Utc>,
}

/// Dashboard view of a key. Never carries the digest.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "key_prefix": "s1c_3f9a",
///   "is_active": true,
///   "created_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub key_prefix: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeySummary {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            key_prefix: key.key_prefix,
            is_active: key.is_active,
            created_at: key.created_at,
        }
    }
}

/// Response body of `GET /api/keys`.
#[derive(Debug, Serialize)]
pub struct KeyListResponse {
    pub keys: Vec<ApiKeySummary>,
    pub active_count: i64,
    pub max_active_keys: u32,
    pub can_issue: bool,
}

/// Response when a key is minted.
///
/// The `api_key` field is the only time the plaintext leaves the service.
#[derive(Debug, Serialize)]
pub struct IssuedKeyResponse {
    pub api_key: String,
    #[serde(flatten)]
    pub key: ApiKeySummary,
}
