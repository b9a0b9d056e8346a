//! Billing tiers and their usage limits.
//!
//! The core never decides what plan an account is on — the billing source
//! supplies the current tier, and the catalog maps it to enforcement limits.
//! `-1` is the unlimited sentinel for both recordings and retention.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Unlimited sentinel for recording count and retention days.
pub const UNLIMITED: i64 = -1;

/// Plan identifier. Stored as its string form on usage records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Unlimited,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Starter => "starter",
            Tier::Pro => "pro",
            Tier::Unlimited => "unlimited",
        }
    }

    /// Parse a stored tier label. Unknown labels map to Free so a stale
    /// record from a removed plan still enforces the most conservative limits.
    pub fn parse(label: &str) -> Tier {
        match label {
            "starter" => Tier::Starter,
            "pro" => Tier::Pro,
            "unlimited" => Tier::Unlimited,
            _ => Tier::Free,
        }
    }
}

/// Usage limits for one tier, as supplied by the billing source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    /// Max recordings per billing period; `-1` = unlimited.
    pub recording_count: i64,
    /// Days a recording is retained; `-1` = permanent.
    pub retention_days: i64,
    /// Whether the plan includes accountability watchers.
    pub has_watchers: bool,
}

impl TierLimits {
    pub fn unlimited_recordings(&self) -> bool {
        self.recording_count == UNLIMITED
    }

    pub fn permanent_retention(&self) -> bool {
        self.retention_days == UNLIMITED
    }
}

/// Tier -> limits mapping. The embedding app populates this from its billing
/// backend; `builtin()` is the default plan ladder.
#[derive(Debug, Clone)]
pub struct TierCatalog {
    limits: HashMap<Tier, TierLimits>,
}

impl TierCatalog {
    pub fn new(limits: HashMap<Tier, TierLimits>) -> Self {
        Self { limits }
    }

    /// Default plan ladder.
    pub fn builtin() -> Self {
        let mut limits = HashMap::new();
        limits.insert(
            Tier::Free,
            TierLimits {
                recording_count: 5,
                retention_days: 30,
                has_watchers: false,
            },
        );
        limits.insert(
            Tier::Starter,
            TierLimits {
                recording_count: 30,
                retention_days: 90,
                has_watchers: false,
            },
        );
        limits.insert(
            Tier::Pro,
            TierLimits {
                recording_count: 100,
                retention_days: 365,
                has_watchers: true,
            },
        );
        limits.insert(
            Tier::Unlimited,
            TierLimits {
                recording_count: UNLIMITED,
                retention_days: UNLIMITED,
                has_watchers: true,
            },
        );
        Self { limits }
    }

    /// Limits for a tier. Missing entries fall back to the Free limits —
    /// an unknown plan must never enforce looser limits than the floor.
    pub fn limits_for(&self, tier: Tier) -> TierLimits {
        self.limits.get(&tier).copied().unwrap_or(TierLimits {
            recording_count: 5,
            retention_days: 30,
            has_watchers: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_known_tiers() {
        for tier in [Tier::Free, Tier::Starter, Tier::Pro, Tier::Unlimited] {
            assert_eq!(Tier::parse(tier.as_str()), tier);
        }
    }

    #[test]
    fn test_parse_unknown_label_falls_back_to_free() {
        assert_eq!(Tier::parse("legacy-gold"), Tier::Free);
    }

    #[test]
    fn test_builtin_unlimited_sentinels() {
        let catalog = TierCatalog::builtin();
        let limits = catalog.limits_for(Tier::Unlimited);
        assert!(limits.unlimited_recordings());
        assert!(limits.permanent_retention());
    }

    #[test]
    fn test_missing_tier_enforces_floor() {
        let catalog = TierCatalog::new(HashMap::new());
        assert_eq!(catalog.limits_for(Tier::Pro).recording_count, 5);
    }
}
