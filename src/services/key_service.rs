//! Key issuance service - minting, regeneration and revocation.
//!
//! # Disclosure
//!
//! The plaintext of a key exists only in the [`IssuedKey`] returned from
//! [`issue`] or [`revoke_all_and_issue`]. Only its prefix and SHA-256 digest
//! are stored, so it can never be shown again.
//!
//! # Atomicity Guarantees
//!
//! The guard check, the optional revoke-all and the insert run as one store
//! operation ([`KeyStore::create_key`]).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::api_key::{ApiKey, ApiKeySummary, KeyListResponse, NewApiKey},
    services::{
        credentials::{self, ParsedApiKey},
        guard::{IssuanceGuard, IssueMode},
    },
    store::KeyStore,
};

/// A freshly minted key. `plaintext` must be handed to the user and then dropped.
#[derive(Debug)]
pub struct IssuedKey {
    pub plaintext: String,
    pub record: ApiKey,
}

/// Mint a new key for `owner_id`, subject to the guard.
///
/// # Process
///
/// 1. Generate a random key with the configured prefix
/// 2. Hash it with SHA-256
/// 3. Check the guard and insert atomically
/// 4. Return the plaintext exactly once
///
/// # Errors
///
/// - `QuotaExceeded`: max active keys reached or cooldown in effect
/// - `Database`: storage failure
pub async fn issue<S>(
    store: &S,
    guard: &IssuanceGuard,
    prefix: &str,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<IssuedKey, AppError>
where
    S: KeyStore + ?Sized,
{
    mint(store, guard, prefix, owner_id, now, IssueMode::Add).await
}

/// Revoke every active key of `owner_id` and mint a replacement.
///
/// Ignores the max-active limit (the old keys go away in the same step) but
/// still honours the cooldown.
pub async fn revoke_all_and_issue<S>(
    store: &S,
    guard: &IssuanceGuard,
    prefix: &str,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<IssuedKey, AppError>
where
    S: KeyStore + ?Sized,
{
    mint(store, guard, prefix, owner_id, now, IssueMode::ReplaceAll).await
}

async fn mint<S>(
    store: &S,
    guard: &IssuanceGuard,
    prefix: &str,
    owner_id: Uuid,
    now: DateTime<Utc>,
    mode: IssueMode,
) -> Result<IssuedKey, AppError>
where
    S: KeyStore + ?Sized,
{
    let plaintext = credentials::generate_api_key(prefix);
    let parsed = ParsedApiKey {
        token: &plaintext,
        prefix,
    };

    let hashed_key = credentials::hash_secret(&plaintext);
    let new_key = NewApiKey {
        owner_id,
        key_prefix: parsed.display_prefix().to_string(),
        hashed_key: hashed_key.clone(),
        created_at: now,
    };

    let record = match store.create_key(new_key, guard, mode).await {
        Ok(record) => record,
        Err(AppError::QuotaExceeded(denial)) => {
            tracing::info!(user_id = %owner_id, reason = denial.reason(), "Key issuance denied");
            return Err(AppError::QuotaExceeded(denial));
        }
        Err(e) => return Err(e),
    };

    debug_assert_eq!(record.hashed_key, hashed_key);

    tracing::info!(
        user_id = %owner_id,
        key_prefix = %record.key_prefix,
        ?mode,
        "API key issued"
    );

    Ok(IssuedKey { plaintext, record })
}

/// Revoke one key. The row stays for the audit trail.
///
/// # Errors
///
/// - `KeyNotFound`: no active key with that id belongs to `owner_id`
pub async fn revoke<S>(store: &S, owner_id: Uuid, key_id: Uuid) -> Result<(), AppError>
where
    S: KeyStore + ?Sized,
{
    if !store.revoke_key(owner_id, key_id).await? {
        return Err(AppError::KeyNotFound);
    }

    tracing::info!(user_id = %owner_id, %key_id, "API key revoked");
    Ok(())
}

/// Dashboard listing, newest first, with current quota usage.
///
/// `can_issue` reports whether [`issue`] would pass the guard at `now`, so the
/// dashboard can disable its button instead of provoking a 429.
pub async fn list<S>(
    store: &S,
    guard: &IssuanceGuard,
    owner_id: Uuid,
    now: DateTime<Utc>,
) -> Result<KeyListResponse, AppError>
where
    S: KeyStore + ?Sized,
{
    let keys = store.list_keys(owner_id).await?;
    let stats = store.key_stats(owner_id).await?;

    Ok(KeyListResponse {
        keys: keys.into_iter().map(ApiKeySummary::from).collect(),
        active_count: stats.active_count,
        max_active_keys: guard.max_active,
        can_issue: guard.should_issue(&stats, now).is_allowed(),
    })
}
