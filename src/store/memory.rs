//! In-memory store for tests.
//!
//! A single lock guards all tables, which gives every trait method the same
//! atomicity the PostgreSQL implementation gets from transactions.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::{ApiKey, NewApiKey},
        oauth::AuthorizationCode,
        principal::{Principal, Profile},
    },
    services::guard::{IssuanceGuard, IssueMode, KeyStats},
    store::{CodeStore, KeyStore, PrincipalStore, Store},
};

#[derive(Default)]
struct Tables {
    keys: Vec<ApiKey>,
    codes: HashMap<String, AuthorizationCode>,
    profiles: HashMap<Uuid, Profile>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    key_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a billing profile, as the billing collaborator would.
    pub fn put_profile(&self, profile: Profile) {
        self.tables.write().profiles.insert(profile.id, profile);
    }

    /// Number of `find_active_key` calls so far.
    pub fn key_lookups(&self) -> usize {
        self.key_lookups.load(Ordering::SeqCst)
    }

    /// Raw record by digest, regardless of activation state.
    pub fn key_by_digest(&self, hashed_key: &str) -> Option<ApiKey> {
        self.tables
            .read()
            .keys
            .iter()
            .find(|k| k.hashed_key == hashed_key)
            .cloned()
    }

    /// Insert a raw key row, bypassing the guard.
    pub fn put_key(&self, key: ApiKey) {
        self.tables.write().keys.push(key);
    }

    pub fn code_count(&self) -> usize {
        self.tables.read().codes.len()
    }
}

fn stats_for(keys: &[ApiKey], owner_id: Uuid) -> KeyStats {
    let active = keys.iter().filter(|k| k.owner_id == owner_id && k.is_active);
    let mut stats = KeyStats::default();
    for key in active {
        stats.active_count += 1;
        stats.latest_created_at = stats.latest_created_at.max(Some(key.created_at));
    }
    stats
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn create_key(
        &self,
        new_key: NewApiKey,
        guard: &IssuanceGuard,
        mode: IssueMode,
    ) -> Result<ApiKey, AppError> {
        let mut tables = self.tables.write();

        let stats = stats_for(&tables.keys, new_key.owner_id);
        guard
            .check(mode, &stats, new_key.created_at)
            .into_result()
            .map_err(AppError::QuotaExceeded)?;

        if tables.keys.iter().any(|k| k.hashed_key == new_key.hashed_key) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "duplicate hashed_key".to_string(),
            )));
        }

        if mode == IssueMode::ReplaceAll {
            for key in tables
                .keys
                .iter_mut()
                .filter(|k| k.owner_id == new_key.owner_id)
            {
                key.is_active = false;
            }
        }

        let key = ApiKey {
            id: Uuid::new_v4(),
            owner_id: new_key.owner_id,
            key_prefix: new_key.key_prefix,
            hashed_key: new_key.hashed_key,
            is_active: true,
            created_at: new_key.created_at,
        };
        tables.keys.push(key.clone());

        Ok(key)
    }

    async fn find_active_key(
        &self,
        scheme: &str,
        hashed_key: &str,
    ) -> Result<Option<ApiKey>, AppError> {
        self.key_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tables
            .read()
            .keys
            .iter()
            .find(|k| k.is_active && k.hashed_key == hashed_key && k.key_prefix.starts_with(scheme))
            .cloned())
    }

    async fn list_keys(&self, owner_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let mut keys: Vec<ApiKey> = self
            .tables
            .read()
            .keys
            .iter()
            .filter(|k| k.owner_id == owner_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn key_stats(&self, owner_id: Uuid) -> Result<KeyStats, AppError> {
        Ok(stats_for(&self.tables.read().keys, owner_id))
    }

    async fn revoke_key(&self, owner_id: Uuid, key_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.write();
        match tables
            .keys
            .iter_mut()
            .find(|k| k.id == key_id && k.owner_id == owner_id && k.is_active)
        {
            Some(key) => {
                key.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CodeStore for MemoryStore {
    async fn insert_code(&self, code: AuthorizationCode) -> Result<(), AppError> {
        self.tables
            .write()
            .codes
            .insert(code.hashed_code.clone(), code);
        Ok(())
    }

    async fn take_code(&self, hashed_code: &str) -> Result<Option<AuthorizationCode>, AppError> {
        Ok(self.tables.write().codes.remove(hashed_code))
    }

    async fn purge_expired_codes(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tables = self.tables.write();
        let before = tables.codes.len();
        tables.codes.retain(|_, code| code.expires_at > now);
        Ok((before - tables.codes.len()) as u64)
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn upsert_principal(&self, principal: &Principal) -> Result<(), AppError> {
        let mut tables = self.tables.write();
        let profile = tables.profiles.entry(principal.id).or_insert_with(|| Profile {
            id: principal.id,
            email: None,
            full_name: None,
            subscription_status: "inactive".to_string(),
            plan_name: None,
            legacy_tier: None,
            created_at: Utc::now(),
        });
        if principal.email.is_some() {
            profile.email = principal.email.clone();
        }
        Ok(())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self.tables.read().profiles.get(&id).cloned())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
