//! Rate/quota guard for key issuance.
//!
//! Decides whether a principal may mint another key, using only state derived
//! from the key store (active key count and the newest active key's creation time).
//! Prevents a looping client from minting a fresh key on every login redirect.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Issuance state derived from a principal's active key records.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct KeyStats {
    pub active_count: i64,
    pub latest_created_at: Option<DateTime<Utc>>,
}

/// Why the guard refused to issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    MaxActiveKeys { max: u32 },
    Cooldown { retry_after: Duration },
}

impl Denial {
    /// Whole seconds to wait, rounded up so waiting that long always clears the cooldown.
    pub fn retry_after_secs(&self) -> Option<i64> {
        match self {
            Denial::MaxActiveKeys { .. } => None,
            Denial::Cooldown { retry_after } => {
                let millis = retry_after.num_milliseconds().max(0);
                Some(((millis + 999) / 1000).max(1))
            }
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Denial::MaxActiveKeys { .. } => "max active keys reached",
            Denial::Cooldown { .. } => "cooldown in effect",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::MaxActiveKeys { max } => write!(
                f,
                "{}: you already have {max} active keys, revoke one or regenerate",
                self.reason()
            ),
            Denial::Cooldown { .. } => write!(
                f,
                "{}: try again in {} seconds",
                self.reason(),
                self.retry_after_secs().unwrap_or(1)
            ),
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny(Denial),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Deny(denial) => Err(denial),
        }
    }
}

/// Whether an issuance adds a key or replaces every active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueMode {
    /// Subject to both the max-active count and the cooldown.
    Add,
    /// Revokes all active keys first; only the cooldown applies.
    ReplaceAll,
}

/// Issuance policy: at most `max_active` active keys, at most one new key per `cooldown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuanceGuard {
    pub cooldown: Duration,
    pub max_active: u32,
}

impl IssuanceGuard {
    pub fn should_issue(&self, stats: &KeyStats, now: DateTime<Utc>) -> GuardDecision {
        if stats.active_count >= i64::from(self.max_active) {
            return GuardDecision::Deny(Denial::MaxActiveKeys {
                max: self.max_active,
            });
        }
        self.check_cooldown(stats, now)
    }

    pub fn should_reissue(&self, stats: &KeyStats, now: DateTime<Utc>) -> GuardDecision {
        self.check_cooldown(stats, now)
    }

    pub fn check(&self, mode: IssueMode, stats: &KeyStats, now: DateTime<Utc>) -> GuardDecision {
        match mode {
            IssueMode::Add => self.should_issue(stats, now),
            IssueMode::ReplaceAll => self.should_reissue(stats, now),
        }
    }

    fn check_cooldown(&self, stats: &KeyStats, now: DateTime<Utc>) -> GuardDecision {
        let Some(latest) = stats.latest_created_at else {
            return GuardDecision::Allow;
        };

        // Out-of-range sums only arise from corrupt timestamps; treat them as a full wait
        let Some(ready_at) = latest.checked_add_signed(self.cooldown) else {
            return GuardDecision::Deny(Denial::Cooldown {
                retry_after: self.cooldown,
            });
        };
        if now < ready_at {
            GuardDecision::Deny(Denial::Cooldown {
                retry_after: ready_at - now,
            })
        } else {
            GuardDecision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> IssuanceGuard {
        IssuanceGuard {
            cooldown: Duration::seconds(60),
            max_active: 3,
        }
    }

    #[test]
    fn allows_first_key() {
        assert!(guard().should_issue(&KeyStats::default(), Utc::now()).is_allowed());
    }

    #[test]
    fn denies_at_max_active() {
        let now = Utc::now();
        let stats = KeyStats {
            active_count: 3,
            latest_created_at: Some(now - Duration::hours(1)),
        };

        assert_eq!(
            guard().should_issue(&stats, now),
            GuardDecision::Deny(Denial::MaxActiveKeys { max: 3 })
        );
    }

    #[test]
    fn cooldown_reports_remaining_wait() {
        let now = Utc::now();
        let stats = KeyStats {
            active_count: 1,
            latest_created_at: Some(now - Duration::seconds(45)),
        };

        match guard().should_issue(&stats, now) {
            GuardDecision::Deny(Denial::Cooldown { retry_after }) => {
                assert_eq!(retry_after, Duration::seconds(15));
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn cooldown_elapses() {
        let now = Utc::now();
        let stats = KeyStats {
            active_count: 1,
            latest_created_at: Some(now - Duration::seconds(60)),
        };
        assert!(guard().should_issue(&stats, now).is_allowed());
    }

    #[test]
    fn reissue_ignores_max_active_but_not_cooldown() {
        let now = Utc::now();
        let full = KeyStats {
            active_count: 3,
            latest_created_at: Some(now - Duration::hours(1)),
        };
        assert!(guard().should_reissue(&full, now).is_allowed());

        let recent = KeyStats {
            active_count: 3,
            latest_created_at: Some(now - Duration::seconds(5)),
        };
        assert!(!guard().check(IssueMode::ReplaceAll, &recent, now).is_allowed());
    }

    #[test]
    fn zero_cooldown_disables_the_wait() {
        let now = Utc::now();
        let guard = IssuanceGuard {
            cooldown: Duration::zero(),
            max_active: 3,
        };
        let stats = KeyStats {
            active_count: 1,
            latest_created_at: Some(now),
        };
        assert!(guard.should_issue(&stats, now).is_allowed());
    }

    #[test]
    fn denial_messages_name_the_reason() {
        let denial = Denial::Cooldown {
            retry_after: Duration::seconds(30),
        };
        assert_eq!(denial.to_string(), "cooldown in effect: try again in 30 seconds");
        assert!(Denial::MaxActiveKeys { max: 3 }
            .to_string()
            .starts_with("max active keys reached"));
    }

    #[test]
    fn partial_seconds_round_up() {
        let denial = Denial::Cooldown {
            retry_after: Duration::milliseconds(400),
        };
        assert_eq!(denial.retry_after_secs(), Some(1));
        assert_eq!(denial.to_string(), "cooldown in effect: try again in 1 seconds");

        let denial = Denial::Cooldown {
            retry_after: Duration::milliseconds(59_001),
        };
        assert_eq!(denial.retry_after_secs(), Some(60));
        assert_eq!(Denial::MaxActiveKeys { max: 3 }.retry_after_secs(), None);
    }

    #[test]
    fn far_future_timestamp_does_not_overflow() {
        let stats = KeyStats {
            active_count: 1,
            latest_created_at: Some(DateTime::<Utc>::MAX_UTC),
        };
        assert_eq!(
            guard().should_issue(&stats, Utc::now()),
            GuardDecision::Deny(Denial::Cooldown {
                retry_after: Duration::seconds(60)
            })
        );
    }
}
