//! Persistence traits for keys, authorization codes and principals.
//!
//! Production uses [`postgres::PgStore`]; tests use an in-memory store behind
//! the same traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::{ApiKey, NewApiKey},
        oauth::AuthorizationCode,
        principal::{Principal, Profile},
    },
    services::guard::{IssuanceGuard, IssueMode, KeyStats},
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Run the guard and insert `new_key` as one atomic step.
    ///
    /// With [`IssueMode::ReplaceAll`] every active key of the owner is revoked
    /// in the same step. Concurrent calls for one owner are serialized, so the
    /// guard's count never goes stale between check and insert.
    ///
    /// # Errors
    ///
    /// - `QuotaExceeded` if the guard denies issuance (nothing is written)
    /// - `Database` on storage failures
    async fn create_key(
        &self,
        new_key: NewApiKey,
        guard: &IssuanceGuard,
        mode: IssueMode,
    ) -> Result<ApiKey, AppError>;

    /// Active key with this digest whose stored `key_prefix` starts with `scheme`
    /// (`s1c_`, `sk_`, ...).
    ///
    /// Only the scheme is compared: earlier dashboard versions stored display
    /// prefixes of other lengths.
    async fn find_active_key(
        &self,
        scheme: &str,
        hashed_key: &str,
    ) -> Result<Option<ApiKey>, AppError>;

    /// All keys of an owner, newest first, including revoked ones.
    async fn list_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError>;

    async fn key_stats(&self, owner_id: Uuid) -> Result<KeyStats, AppError>;

    /// Clear `is_active` on one key. Returns false if no active key matched.
    async fn revoke_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn insert_code(&self, code: AuthorizationCode) -> Result<(), AppError>;

    /// Remove and return the artifact for `hashed_code`.
    ///
    /// At most one caller ever receives a given artifact.
    async fn take_code(&self, hashed_code: &str) -> Result<Option<AuthorizationCode>, AppError>;

    /// Delete every artifact with `expires_at <= now`.
    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Mirror a principal seen at login. Never touches billing columns.
    async fn upsert_principal(&self, principal: &Principal) -> Result<(), AppError>;

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError>;
}

/// Everything the handlers need from persistence.
#[async_trait]
pub trait Store: KeyStore + CodeStore + PrincipalStore {
    /// Cheap connectivity check for `/health`.
    async fn ping(&self) -> Result<(), AppError>;
}
