//! Entitlement tier resolution.
//!
//! Maps a principal's billing state to a tier with a fixed precedence:
//!
//! 1. Unlimited override (policy table of special users)
//! 2. Active subscription (professional or enterprise)
//! 3. Trial
//! 4. Legacy `user_tiers` entry
//! 5. Free

use uuid::Uuid;

use crate::models::principal::{Entitlement, Profile, Tier};

/// One entry of the unlimited-override table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialUserRule {
    Id(Uuid),
    /// Compared case-insensitively.
    Email(String),
}

impl SpecialUserRule {
    fn matches(&self, id: Uuid, email: Option<&str>) -> bool {
        match self {
            SpecialUserRule::Id(special) => *special == id,
            SpecialUserRule::Email(special) => {
                email.is_some_and(|email| email.eq_ignore_ascii_case(special))
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntitlementPolicy {
    rules: Vec<SpecialUserRule>,
}

impl EntitlementPolicy {
    pub fn new(rules: Vec<SpecialUserRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[SpecialUserRule] {
        &self.rules
    }

    pub fn is_unlimited(&self, id: Uuid, email: Option<&str>) -> bool {
        self.rules.iter().any(|rule| rule.matches(id, email))
    }

    /// Resolve the entitlement for `id`. A missing profile resolves to the free tier.
    pub fn resolve(&self, id: Uuid, profile: Option<&Profile>) -> Entitlement {
        let email = profile.and_then(|p| p.email.as_deref());

        if self.is_unlimited(id, email) {
            tracing::info!(user_id = %id, "Unlimited override applied");
            return Entitlement {
                tier: Tier::Professional,
                plan: "Professional (Unlimited)".to_string(),
                subscription_status: "active".to_string(),
                unlimited: true,
            };
        }

        let status = profile
            .map(|p| p.subscription_status.as_str())
            .unwrap_or("inactive");
        let plan_name = profile.and_then(|p| p.plan_name.clone());
        let legacy = profile
            .and_then(|p| p.legacy_tier.as_deref())
            .map(str::to_ascii_lowercase);
        let legacy = legacy.as_deref();

        let plan_mentions = |needle: &str| {
            plan_name
                .as_deref()
                .is_some_and(|plan| plan.to_ascii_lowercase().contains(needle))
        };

        match status {
            "active" => {
                let tier = if legacy == Some("professional") || plan_mentions("professional") {
                    Tier::Professional
                } else if legacy == Some("enterprise") || plan_mentions("enterprise") {
                    Tier::Enterprise
                } else {
                    Tier::Professional
                };
                let plan = plan_name.unwrap_or_else(|| tier.default_plan().to_string());
                Entitlement::limited(tier, plan, "active")
            }
            "trial" => Entitlement::limited(
                Tier::Trial,
                plan_name.unwrap_or_else(|| Tier::Trial.default_plan().to_string()),
                "trial",
            ),
            _ => match legacy {
                Some("professional") => Entitlement::limited(
                    Tier::Professional,
                    Tier::Professional.default_plan().to_string(),
                    "active",
                ),
                Some("enterprise") => Entitlement::limited(
                    Tier::Enterprise,
                    Tier::Enterprise.default_plan().to_string(),
                    "active",
                ),
                _ => Entitlement::limited(
                    Tier::Individual,
                    Tier::Individual.default_plan().to_string(),
                    "inactive",
                ),
            },
        }
    }
}
