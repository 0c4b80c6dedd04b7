//! API key validation service.
//!
//! # Process
//!
//! 1. Reject tokens that are not `<known prefix><48 hex>` without touching the store
//! 2. Hash the token and look up an active record by `(scheme prefix, digest)`
//! 3. Resolve the owner's entitlement from the billing profile
//!
//! Unknown and revoked keys both surface as `InvalidApiKey`.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::principal::ValidatedUser,
    services::{credentials, entitlement_service::EntitlementPolicy},
    store::{KeyStore, PrincipalStore},
};

/// Validate a presented key and return its owner.
///
/// # Errors
///
/// - `MalformedApiKey`: wrong shape, store not consulted
/// - `InvalidApiKey`: no active key matches
/// - `Database`: store unreachable (retryable)
pub async fn validate<S>(
    store: &S,
    accepted_prefixes: &[&str],
    policy: &EntitlementPolicy,
    token: &str,
) -> Result<ValidatedUser, AppError>
where
    S: KeyStore + PrincipalStore + ?Sized,
{
    let parsed = credentials::parse_api_key(token, accepted_prefixes)?;
    let hashed_key = credentials::hash_secret(parsed.token);

    let key = store
        .find_active_key(parsed.prefix, &hashed_key)
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    resolve_user(store, policy, key.owner_id).await
}

/// Identity and entitlement for a principal id.
pub async fn resolve_user<S>(
    store: &S,
    policy: &EntitlementPolicy,
    user_id: Uuid,
) -> Result<ValidatedUser, AppError>
where
    S: PrincipalStore + ?Sized,
{
    let profile = store.find_profile(user_id).await?;
    debug_assert!(profile.as_ref().is_none_or(|p| p.id == user_id));
    let entitlement = policy.resolve(user_id, profile.as_ref());

    Ok(ValidatedUser::new(user_id, profile.as_ref(), entitlement))
}
