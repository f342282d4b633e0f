//! Billing subscription snapshot and plan definitions.
//!
//! These are read-only mirrors of what the payment processor syncs into the
//! data platform. State transitions happen server-side; this layer only reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SubscriptionId;

/// Sentinel for "no limit" on numeric plan limits.
pub const UNLIMITED: i64 = -1;

const SECONDS_PER_DAY: i64 = 86_400;

/// Billing status as reported by the payment processor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Unpaid => "unpaid",
        }
    }
}

impl core::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean feature switches carried by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlanFeatures {
    #[serde(default)]
    pub analytics: bool,
    #[serde(default)]
    pub cross_chamber: bool,
}

/// Numeric quotas carried by a plan. [`UNLIMITED`] means no cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_members: i64,
    pub max_events: i64,
}

impl PlanLimits {
    pub fn unlimited_members(&self) -> bool {
        self.max_members == UNLIMITED
    }

    pub fn unlimited_events(&self) -> bool {
        self.max_events == UNLIMITED
    }
}

/// A billing plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub features: PlanFeatures,
    #[serde(default)]
    pub limits: PlanLimits,
}

impl Plan {
    pub fn new(name: impl Into<String>, features: PlanFeatures, limits: PlanLimits) -> Self {
        Self {
            name: name.into(),
            features,
            limits,
        }
    }
}

/// Current subscription for an account (zero or one per account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    #[serde(default)]
    pub trial_ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
}

impl SubscriptionSnapshot {
    pub fn new(status: SubscriptionStatus, plan: Plan) -> Self {
        Self {
            id: SubscriptionId::new(),
            status,
            plan,
            trial_ends_at: None,
            current_period_end: None,
        }
    }

    pub fn with_trial_end(mut self, trial_ends_at: DateTime<Utc>) -> Self {
        self.trial_ends_at = Some(trial_ends_at);
        self
    }

    pub fn is_trialing(&self) -> bool {
        self.status == SubscriptionStatus::Trialing
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Whole days left in the trial, rounded up.
    ///
    /// Zero or negative once the trial end has passed. `None` when not
    /// trialing or when the trial end is unknown.
    pub fn trial_days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_trialing() {
            return None;
        }
        let ends_at = self.trial_ends_at?;
        let seconds = (ends_at - now).num_seconds();
        // Ceiling for positive spans, truncation toward zero for negative ones.
        let days = if seconds > 0 {
            (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
        } else {
            seconds / SECONDS_PER_DAY
        };
        Some(days)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn trial(ends_at: DateTime<Utc>) -> SubscriptionSnapshot {
        SubscriptionSnapshot::new(
            SubscriptionStatus::Trialing,
            Plan::new("Starter", PlanFeatures::default(), PlanLimits::default()),
        )
        .with_trial_end(ends_at)
    }

    #[test]
    fn partial_days_round_up() {
        let sub = trial(now() + Duration::hours(30));
        assert_eq!(sub.trial_days_remaining(now()), Some(2));

        let sub = trial(now() + Duration::seconds(1));
        assert_eq!(sub.trial_days_remaining(now()), Some(1));
    }

    #[test]
    fn expired_trial_is_zero_or_negative() {
        let sub = trial(now());
        assert_eq!(sub.trial_days_remaining(now()), Some(0));

        let sub = trial(now() - Duration::days(3));
        assert_eq!(sub.trial_days_remaining(now()), Some(-3));
    }

    #[test]
    fn non_trialing_subscription_has_no_trial_days() {
        let mut sub = trial(now() + Duration::days(5));
        sub.status = SubscriptionStatus::Active;
        assert_eq!(sub.trial_days_remaining(now()), None);
    }

    #[test]
    fn minus_one_means_unlimited() {
        let limits = PlanLimits {
            max_members: UNLIMITED,
            max_events: 50,
        };
        assert!(limits.unlimited_members());
        assert!(!limits.unlimited_events());
    }

    #[test]
    fn status_uses_processor_spelling() {
        let status: SubscriptionStatus = serde_json::from_str("\"past_due\"").unwrap();
        assert_eq!(status, SubscriptionStatus::PastDue);
        assert_eq!(status.to_string(), "past_due");
    }
}
