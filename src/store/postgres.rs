//! PostgreSQL implementation of the store traits.
//!
//! # Atomicity
//!
//! Key issuance takes a transaction-scoped advisory lock keyed on the owner
//! before reading the guard's stats, so two concurrent issuances for one
//! principal cannot both pass the max-active check. Revoke-all and the insert
//! commit together, so validators never see a principal with zero active keys
//! mid-regeneration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        api_key::{ApiKey, NewApiKey},
        oauth::AuthorizationCode,
        principal::{Principal, Profile},
    },
    services::guard::{IssuanceGuard, IssueMode, KeyStats},
    store::{CodeStore, KeyStore, PrincipalStore, Store},
};

const KEY_COLUMNS: &str = "id, owner_id, key_prefix, hashed_key, is_active, created_at";

const STATS_QUERY: &str = r#"
    SELECT COUNT(*) AS active_count, MAX(created_at) AS latest_created_at
    FROM api_keys
    WHERE owner_id = $1 AND is_active = true
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PgStore {
    async fn create_key(
        &self,
        new_key: NewApiKey,
        guard: &IssuanceGuard,
        mode: IssueMode,
    ) -> Result<ApiKey, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serialize issuance per owner until commit/rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(new_key.owner_id.to_string())
            .execute(&mut *tx)
            .await?;

        let stats = sqlx::query_as::<_, KeyStats>(STATS_QUERY)
            .bind(new_key.owner_id)
            .fetch_one(&mut *tx)
            .await?;

        if let Err(denial) = guard.check(mode, &stats, new_key.created_at).into_result() {
            tx.rollback().await?;
            return Err(AppError::QuotaExceeded(denial));
        }

        if mode == IssueMode::ReplaceAll {
            let revoked = sqlx::query(
                "UPDATE api_keys SET is_active = false WHERE owner_id = $1 AND is_active = true",
            )
            .bind(new_key.owner_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            tracing::info!(user_id = %new_key.owner_id, revoked, "Revoked active keys");
        }

        let key = sqlx::query_as::<_, ApiKey>(&format!(
            r#"
            INSERT INTO api_keys (owner_id, key_prefix, hashed_key, is_active, created_at)
            VALUES ($1, $2, $3, true, $4)
            RETURNING {KEY_COLUMNS}
            "#
        ))
        .bind(new_key.owner_id)
        .bind(&new_key.key_prefix)
        .bind(&new_key.hashed_key)
        .bind(new_key.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(key)
    }

    async fn find_active_key(
        &self,
        scheme: &str,
        hashed_key: &str,
    ) -> Result<Option<ApiKey>, AppError> {
        // starts_with rather than LIKE: `_` in the scheme is a LIKE wildcard
        let key = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys
             WHERE hashed_key = $1 AND starts_with(key_prefix, $2) AND is_active = true"
        ))
        .bind(hashed_key)
        .bind(scheme)
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    async fn list_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(&format!(
            "SELECT {KEY_COLUMNS} FROM api_keys WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn key_stats(&self, owner_id: Uuid) -> Result<KeyStats, AppError> {
        let stats = sqlx::query_as::<_, KeyStats>(STATS_QUERY)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(stats)
    }

    async fn revoke_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = false
             WHERE id = $1 AND owner_id = $2 AND is_active = true",
        )
        .bind(key_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CodeStore for PgStore {
    async fn insert_code(&self, code: AuthorizationCode) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO oauth_codes (hashed_code, owner_id, code_challenge, state, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&code.hashed_code)
        .bind(code.owner_id)
        .bind(&code.code_challenge)
        .bind(&code.state)
        .bind(code.expires_at)
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take_code(&self, hashed_code: &str) -> Result<Option<AuthorizationCode>, AppError> {
        let code = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            DELETE FROM oauth_codes
            WHERE hashed_code = $1
            RETURNING hashed_code, owner_id, code_challenge, state, expires_at, created_at
            "#,
        )
        .bind(hashed_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM oauth_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PrincipalStore for PgStore {
    async fn upsert_principal(&self, principal: &Principal) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET email = COALESCE(EXCLUDED.email, profiles.email),
                updated_at = NOW()
            "#,
        )
        .bind(principal.id)
        .bind(&principal.email)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.id, p.email, p.full_name, p.subscription_status, p.plan_name,
                   t.tier AS legacy_tier, p.created_at
            FROM profiles p
            LEFT JOIN user_tiers t ON t.user_id = p.id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
