//! Time-based license status with tier-dependent grace windows.
//!
//! Boundaries:
//! - `now < exp` is Valid
//! - `exp <= now < exp + grace(tier)` is Grace (the instant `now == exp` is Grace)
//! - `now >= exp + grace(tier)` is Expired

use crate::clock::Clock;
use crate::SkillgateError;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// License tier, lowest privilege first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Lowest-privilege tier; used when the claim is absent or unknown.
    Free,
    /// Individual paid tier.
    Pro,
    /// Team tier.
    Team,
    /// Enterprise tier.
    Enterprise,
}

impl Tier {
    /// All tiers in privilege order.
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Pro, Tier::Team, Tier::Enterprise];

    /// Parse a tier name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            "team" => Some(Tier::Team),
            "enterprise" => Some(Tier::Enterprise),
            _ => None,
        }
    }

    /// Lowercase tier name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Team => "team",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grace window, in hours, for each tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraceTable {
    free: u32,
    pro: u32,
    team: u32,
    enterprise: u32,
}

impl Default for GraceTable {
    fn default() -> Self {
        Self {
            free: 24,
            pro: 72,
            team: 168,
            enterprise: 336,
        }
    }
}

impl GraceTable {
    /// Table where every tier gets the same window.
    pub fn uniform(hours: u32) -> Self {
        Self {
            free: hours,
            pro: hours,
            team: hours,
            enterprise: hours,
        }
    }

    /// Grace hours configured for a tier.
    pub fn hours(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free,
            Tier::Pro => self.pro,
            Tier::Team => self.team,
            Tier::Enterprise => self.enterprise,
        }
    }

    /// Override the grace hours for one tier.
    pub fn set_hours(&mut self, tier: Tier, hours: u32) {
        match tier {
            Tier::Free => self.free = hours,
            Tier::Pro => self.pro = hours,
            Tier::Team => self.team = hours,
            Tier::Enterprise => self.enterprise = hours,
        }
    }

    /// Grace window for a tier.
    pub fn grace_for(&self, tier: Tier) -> Duration {
        Duration::hours(i64::from(self.hours(tier)))
    }

    /// Apply overrides of the form `free=24,pro=72`.
    ///
    /// Tiers not named keep their current value.
    pub fn with_overrides(mut self, table: &str) -> Result<Self, SkillgateError> {
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, hours) = entry.split_once('=').ok_or_else(|| {
                SkillgateError::ConfigError(format!("grace entry {entry:?} is not tier=hours"))
            })?;
            let tier = Tier::from_name(name).ok_or_else(|| {
                SkillgateError::ConfigError(format!("unknown tier {:?} in grace table", name.trim()))
            })?;
            let hours: u32 = hours.trim().parse().map_err(|_| {
                SkillgateError::ConfigError(format!("grace hours {:?} is not a number", hours.trim()))
            })?;
            self.set_hours(tier, hours);
        }
        Ok(self)
    }
}

/// Claims the evaluator reads from a verified payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseClaims {
    /// Gated skill this license unlocks, if named.
    pub skill: Option<String>,
    /// License tier (defaults to [`Tier::Free`]).
    pub tier: Tier,
    /// Absolute expiry.
    pub exp: DateTime<Utc>,
    /// Issued-at, if present.
    pub iat: Option<DateTime<Utc>>,
}

impl LicenseClaims {
    /// Extract claims from a decoded payload.
    ///
    /// `exp` is required; a missing, non-integer or out-of-range value is
    /// [`SkillgateError::MissingExpiry`], never an eternal license.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, SkillgateError> {
        let exp = payload
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or(SkillgateError::MissingExpiry)?;

        let iat = payload
            .get("iat")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        let tier = match payload.get("tier").and_then(Value::as_str) {
            Some(name) => Tier::from_name(name).unwrap_or_else(|| {
                tracing::debug!(tier = name, "unknown tier, using lowest privilege");
                Tier::Free
            }),
            None => Tier::Free,
        };

        let skill = payload
            .get("skill")
            .and_then(Value::as_str)
            .map(String::from);

        Ok(Self {
            skill,
            tier,
            exp,
            iat,
        })
    }
}

/// Time-based status of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    /// Before `exp`; `remaining` until `exp`.
    Valid {
        /// Time left until expiry.
        remaining: Duration,
    },
    /// Inside the grace window; `remaining` until the window closes.
    Grace {
        /// Time left in the grace window.
        remaining: Duration,
    },
    /// Past the grace window; `since` is the time elapsed since `exp`.
    Expired {
        /// Time elapsed since expiry.
        since: Duration,
    },
}

/// Compute the status of already-extracted claims at `now`.
pub fn evaluate_claims(claims: &LicenseClaims, grace: &GraceTable, now: DateTime<Utc>) -> ExpiryStatus {
    if now < claims.exp {
        return ExpiryStatus::Valid {
            remaining: claims.exp - now,
        };
    }

    // Compared as durations: `exp + grace` can overflow the calendar for huge windows.
    let elapsed = now - claims.exp;
    let window = grace.grace_for(claims.tier);
    if elapsed < window {
        ExpiryStatus::Grace {
            remaining: window - elapsed,
        }
    } else {
        ExpiryStatus::Expired { since: elapsed }
    }
}

/// Evaluate a payload against the grace table.
///
/// Callers must only pass payloads whose signature has already verified.
pub fn evaluate(
    payload: &Map<String, Value>,
    grace: &GraceTable,
    clock: &dyn Clock,
) -> Result<(LicenseClaims, ExpiryStatus), SkillgateError> {
    let claims = LicenseClaims::from_payload(payload)?;
    let status = evaluate_claims(&claims, grace, clock.now_utc());
    Ok((claims, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use proptest::prelude::*;
    use serde_json::json;

    const EXP: i64 = 1_750_000_000;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn status_at(now: i64, tier: &str, table: &GraceTable) -> ExpiryStatus {
        let p = payload(json!({"exp": EXP, "tier": tier}));
        evaluate(&p, table, &MockClock::at_unix(now)).unwrap().1
    }

    #[test]
    fn before_exp_is_valid() {
        let status = status_at(EXP - 3600, "pro", &GraceTable::default());
        assert_eq!(
            status,
            ExpiryStatus::Valid {
                remaining: Duration::hours(1)
            }
        );
    }

    #[test]
    fn exactly_exp_is_grace() {
        let table = GraceTable::uniform(1);
        let status = status_at(EXP, "pro", &table);
        assert_eq!(
            status,
            ExpiryStatus::Grace {
                remaining: Duration::hours(1)
            }
        );
    }

    #[test]
    fn exactly_end_of_grace_is_expired() {
        let table = GraceTable::uniform(1);
        let status = status_at(EXP + 3600, "pro", &table);
        assert_eq!(
            status,
            ExpiryStatus::Expired {
                since: Duration::hours(1)
            }
        );
    }

    #[test]
    fn one_second_before_end_of_grace_is_grace() {
        let table = GraceTable::uniform(1);
        let status = status_at(EXP + 3599, "pro", &table);
        assert_eq!(
            status,
            ExpiryStatus::Grace {
                remaining: Duration::seconds(1)
            }
        );
    }

    #[test]
    fn zero_grace_means_expired_at_exp() {
        let status = status_at(EXP, "free", &GraceTable::uniform(0));
        assert_eq!(
            status,
            ExpiryStatus::Expired {
                since: Duration::zero()
            }
        );
    }

    #[test]
    fn huge_grace_window_does_not_overflow() {
        let claims = LicenseClaims {
            skill: None,
            tier: Tier::Free,
            exp: DateTime::from_timestamp(EXP, 0).unwrap(),
            iat: None,
        };
        let now = DateTime::from_timestamp(EXP + 100, 0).unwrap();
        let table = GraceTable::uniform(u32::MAX);

        let status = evaluate_claims(&claims, &table, now);
        assert_eq!(
            status,
            ExpiryStatus::Grace {
                remaining: Duration::hours(i64::from(u32::MAX)) - Duration::seconds(100)
            }
        );
    }

    #[test]
    fn grace_depends_on_tier() {
        let table = GraceTable::default();
        let two_days_late = EXP + 48 * 3600;
        assert!(matches!(
            status_at(two_days_late, "free", &table),
            ExpiryStatus::Expired { .. }
        ));
        assert!(matches!(
            status_at(two_days_late, "pro", &table),
            ExpiryStatus::Grace { .. }
        ));
    }

    #[test]
    fn missing_exp_is_an_error() {
        let p = payload(json!({"tier": "pro", "skill": "deploy"}));
        let result = evaluate(&p, &GraceTable::default(), &MockClock::at_unix(EXP));
        assert!(matches!(result, Err(SkillgateError::MissingExpiry)));
    }

    #[test]
    fn non_integer_exp_is_an_error() {
        for bad in [json!("2030-01-01"), json!(1.5), json!(null), json!(true)] {
            let p = payload(json!({ "exp": bad }));
            let result = LicenseClaims::from_payload(&p);
            assert!(matches!(result, Err(SkillgateError::MissingExpiry)));
        }
    }

    #[test]
    fn absent_or_unknown_tier_is_free() {
        let absent = LicenseClaims::from_payload(&payload(json!({"exp": EXP}))).unwrap();
        assert_eq!(absent.tier, Tier::Free);

        let unknown =
            LicenseClaims::from_payload(&payload(json!({"exp": EXP, "tier": "platinum"}))).unwrap();
        assert_eq!(unknown.tier, Tier::Free);
    }

    #[test]
    fn claims_extraction() {
        let p = payload(json!({
            "exp": EXP,
            "iat": EXP - 86400,
            "tier": "Team",
            "skill": "code-review"
        }));
        let claims = LicenseClaims::from_payload(&p).unwrap();
        assert_eq!(claims.tier, Tier::Team);
        assert_eq!(claims.skill.as_deref(), Some("code-review"));
        assert_eq!(claims.exp.timestamp(), EXP);
        assert_eq!(claims.iat.map(|t| t.timestamp()), Some(EXP - 86400));
    }

    #[test]
    fn grace_overrides() {
        let table = GraceTable::default()
            .with_overrides("free=1, enterprise=720")
            .unwrap();
        assert_eq!(table.hours(Tier::Free), 1);
        assert_eq!(table.hours(Tier::Pro), 72);
        assert_eq!(table.hours(Tier::Enterprise), 720);
    }

    #[test]
    fn grace_overrides_reject_garbage() {
        for bad in ["free", "gold=3", "pro=many", "pro=-1"] {
            let result = GraceTable::default().with_overrides(bad);
            assert!(
                matches!(result, Err(SkillgateError::ConfigError(_))),
                "{bad} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn status_matches_boundaries(
            offset in -200_000i64..200_000,
            hours in 0u32..48,
            tier in prop::sample::select(Tier::ALL.to_vec()),
        ) {
            let table = GraceTable::uniform(hours);
            let grace = i64::from(hours) * 3600;
            let status = status_at(EXP + offset, tier.as_str(), &table);
            if offset < 0 {
                prop_assert!(matches!(status, ExpiryStatus::Valid { .. }), "offset {} gave {:?}", offset, status);
            } else if offset < grace {
                prop_assert_eq!(status, ExpiryStatus::Grace { remaining: Duration::seconds(grace - offset) });
            } else {
                prop_assert_eq!(status, ExpiryStatus::Expired { since: Duration::seconds(offset) });
            }
        }
    }
}
