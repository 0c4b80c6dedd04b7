//! Principal, billing profile and entitlement models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated user identity as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// A principal's billing profile.
///
/// # Database Tables
///
/// Maps to `profiles` joined with the legacy `user_tiers` table. The
/// `subscription_status` and `plan_name` columns belong to the billing
/// collaborator and are only read here.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,

    /// `active`, `trial`, `inactive`, ... as written by billing webhooks
    pub subscription_status: String,
    pub plan_name: Option<String>,

    /// Tier from `user_tiers`, consulted only when no subscription applies
    pub legacy_tier: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Name shown to the editor: full name, else the email's local part, else "User".
    pub fn display_name(&self) -> String {
        display_name(self.full_name.as_deref(), self.email.as_deref())
    }
}

pub fn display_name(full_name: Option<&str>, email: Option<&str>) -> String {
    full_name
        .filter(|n| !n.is_empty())
        .or_else(|| email.and_then(|e| e.split('@').next()).filter(|n| !n.is_empty()))
        .unwrap_or("User")
        .to_string()
}

/// Feature level granted to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Individual,
    Trial,
    Professional,
    Enterprise,
}

impl Tier {
    pub fn default_plan(self) -> &'static str {
        match self {
            Tier::Individual => "Free",
            Tier::Trial => "Free Trial",
            Tier::Professional => "Professional",
            Tier::Enterprise => "Enterprise",
        }
    }
}

/// Resolved entitlement for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entitlement {
    pub tier: Tier,
    pub plan: String,
    pub subscription_status: String,

    /// Set for the unlimited override; tells the extension to skip usage limits
    pub unlimited: bool,
}

impl Entitlement {
    pub fn limited(tier: Tier, plan: String, subscription_status: &str) -> Self {
        Self {
            tier,
            plan,
            subscription_status: subscription_status.to_string(),
            unlimited: false,
        }
    }
}

/// Identity and entitlement returned for a valid key.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "email": "dev@example.com",
///   "full_name": "dev",
///   "tier": "professional",
///   "plan": "Professional",
///   "subscription_status": "active",
///   "unlimited": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: String,
    pub tier: Tier,
    pub plan: String,
    pub subscription_status: String,
    pub unlimited: bool,
}

impl ValidatedUser {
    pub fn new(id: Uuid, profile: Option<&Profile>, entitlement: Entitlement) -> Self {
        Self {
            id,
            email: profile.and_then(|p| p.email.clone()),
            full_name: profile
                .map(Profile::display_name)
                .unwrap_or_else(|| display_name(None, None)),
            tier: entitlement.tier,
            plan: entitlement.plan,
            subscription_status: entitlement.subscription_status,
            unlimited: entitlement.unlimited,
        }
    }
}

/// Response body of `POST /api/auth/validate`.
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
    pub user: ValidatedUser,
}

/// Response body of `GET /api/auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: ValidatedUser,
    pub created_at: Option<DateTime<Utc>>,
}
