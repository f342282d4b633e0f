//! Capability derivation.
//!
//! [`Permissions::derive`] is a pure function of [`PermissionInputs`]. The
//! inputs are extracted from a snapshot and compared structurally, so
//! [`PermissionCache`] can hand back the previous result while nothing that
//! matters has changed.

use core::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use chamberhub_core::{DomainError, MembershipRole, Plan, ProfileRole, SubscriptionStatus};

use crate::AuthSnapshot;

/// Everything capability derivation is allowed to look at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionInputs {
    pub profile_role: Option<ProfileRole>,
    pub membership_role: Option<MembershipRole>,
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
    pub trial_days_remaining: Option<i64>,
}

impl PermissionInputs {
    pub fn from_snapshot(snapshot: &AuthSnapshot) -> Self {
        Self {
            profile_role: snapshot.user_profile.as_ref().map(|p| p.role.clone()),
            membership_role: snapshot.primary_membership.as_ref().map(|m| m.role),
            plan: snapshot.subscription.as_ref().map(|s| s.plan.clone()),
            status: snapshot.subscription.as_ref().map(|s| s.status),
            trial_days_remaining: snapshot.trial_days_remaining,
        }
    }
}

/// Plan-gated features that [`Permissions::requires_upgrade`] understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Analytics,
    CrossChamber,
    UnlimitedMembers,
    UnlimitedEvents,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Analytics,
        Feature::CrossChamber,
        Feature::UnlimitedMembers,
        Feature::UnlimitedEvents,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Analytics => "analytics",
            Feature::CrossChamber => "cross_chamber",
            Feature::UnlimitedMembers => "unlimited_members",
            Feature::UnlimitedEvents => "unlimited_events",
        }
    }
}

impl FromStr for Feature {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DomainError::unknown_variant("feature", s))
    }
}

/// Billing banner shown above chamber pages. At most one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionMessage {
    NoSubscription,
    TrialActive { days_remaining: i64 },
    TrialExpired,
    PastDue,
    Canceled,
    Incomplete,
    Unpaid,
}

impl core::fmt::Display for SubscriptionMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SubscriptionMessage::NoSubscription => {
                f.write_str("No active subscription. Choose a plan to unlock chamber features.")
            }
            SubscriptionMessage::TrialActive { days_remaining: 1 } => {
                f.write_str("Your free trial ends in 1 day.")
            }
            SubscriptionMessage::TrialActive { days_remaining } => {
                write!(f, "Your free trial ends in {days_remaining} days.")
            }
            SubscriptionMessage::TrialExpired => {
                f.write_str("Your free trial has ended. Upgrade to keep access to your chamber.")
            }
            SubscriptionMessage::PastDue => f.write_str(
                "Your payment is past due. Update your billing details to avoid interruption.",
            ),
            SubscriptionMessage::Canceled => f.write_str(
                "Your subscription has been canceled. Resubscribe to restore premium features.",
            ),
            SubscriptionMessage::Incomplete => f.write_str(
                "Your subscription setup is incomplete. Finish checkout to activate your plan.",
            ),
            SubscriptionMessage::Unpaid => f.write_str(
                "Your subscription is unpaid. Premium features are paused until payment is received.",
            ),
        }
    }
}

/// Derived capability set. Immutable; obtain a new one by re-deriving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permissions {
    is_admin: bool,
    is_staff: bool,
    is_chamber_admin: bool,
    has_analytics_access: bool,
    has_cross_chamber_access: bool,
    has_unlimited_members: bool,
    has_unlimited_events: bool,
    has_subscription: bool,
    has_active_subscription: bool,
    is_trialing: bool,
    trial_days_remaining: Option<i64>,
    status: Option<SubscriptionStatus>,
}

impl Permissions {
    pub fn derive(inputs: &PermissionInputs) -> Self {
        let is_admin = inputs.membership_role == Some(MembershipRole::Admin);
        let is_staff = inputs.membership_role == Some(MembershipRole::Staff) || is_admin;
        let is_chamber_admin = inputs.profile_role == Some(ProfileRole::ChamberAdmin);

        let plan = inputs.plan.as_ref();
        let features = plan.map(|p| p.features).unwrap_or_default();
        let limits = plan.map(|p| p.limits).unwrap_or_default();

        Self {
            is_admin,
            is_staff,
            is_chamber_admin,
            has_analytics_access: features.analytics,
            has_cross_chamber_access: features.cross_chamber,
            has_unlimited_members: plan.is_some() && limits.unlimited_members(),
            has_unlimited_events: plan.is_some() && limits.unlimited_events(),
            has_subscription: inputs.status.is_some(),
            has_active_subscription: inputs.status == Some(SubscriptionStatus::Active),
            is_trialing: inputs.status == Some(SubscriptionStatus::Trialing),
            trial_days_remaining: inputs.trial_days_remaining,
            status: inputs.status,
        }
    }

    pub fn from_snapshot(snapshot: &AuthSnapshot) -> Self {
        Self::derive(&PermissionInputs::from_snapshot(snapshot))
    }

    /// Membership role of the primary membership is `admin`.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Primary membership role is `staff` or `admin`.
    pub fn is_staff(&self) -> bool {
        self.is_staff
    }

    /// Profile-level role is `chamber_admin`.
    ///
    /// Can disagree with [`Permissions::is_admin`]; callers pick the one that
    /// matters for their screen.
    pub fn is_chamber_admin(&self) -> bool {
        self.is_chamber_admin
    }

    pub fn has_analytics_access(&self) -> bool {
        self.has_analytics_access
    }

    pub fn has_cross_chamber_access(&self) -> bool {
        self.has_cross_chamber_access
    }

    pub fn has_unlimited_members(&self) -> bool {
        self.has_unlimited_members
    }

    pub fn has_unlimited_events(&self) -> bool {
        self.has_unlimited_events
    }

    pub fn has_active_subscription(&self) -> bool {
        self.has_active_subscription
    }

    pub fn is_trialing(&self) -> bool {
        self.is_trialing
    }

    pub fn trial_days_remaining(&self) -> Option<i64> {
        self.trial_days_remaining
    }

    /// Trialing with at least one day left.
    pub fn has_active_trial(&self) -> bool {
        self.is_trialing && self.trial_days_remaining.unwrap_or(0) > 0
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::Analytics => self.has_analytics_access,
            Feature::CrossChamber => self.has_cross_chamber_access,
            Feature::UnlimitedMembers => self.has_unlimited_members,
            Feature::UnlimitedEvents => self.has_unlimited_events,
        }
    }

    /// Whether using `feature` should prompt an upgrade.
    ///
    /// Always true without an active subscription or active trial. Feature
    /// names this layer does not know return false.
    pub fn requires_upgrade(&self, feature: &str) -> bool {
        if !self.has_active_subscription && !self.has_active_trial() {
            return true;
        }
        match feature.parse::<Feature>() {
            Ok(feature) => !self.has_feature(feature),
            Err(_) => {
                tracing::debug!(feature, "requires_upgrade called with unknown feature");
                false
            }
        }
    }

    /// The single billing message to show, if any.
    ///
    /// Priority: no subscription, then trial (active before expired), then
    /// the status-specific messages. An active subscription has none.
    pub fn subscription_message(&self) -> Option<SubscriptionMessage> {
        if !self.has_subscription {
            return Some(SubscriptionMessage::NoSubscription);
        }
        if self.is_trialing {
            let days = self.trial_days_remaining.unwrap_or(0);
            return Some(if days > 0 {
                SubscriptionMessage::TrialActive {
                    days_remaining: days,
                }
            } else {
                SubscriptionMessage::TrialExpired
            });
        }
        match self.status? {
            SubscriptionStatus::PastDue => Some(SubscriptionMessage::PastDue),
            SubscriptionStatus::Canceled => Some(SubscriptionMessage::Canceled),
            SubscriptionStatus::Incomplete => Some(SubscriptionMessage::Incomplete),
            SubscriptionStatus::Unpaid => Some(SubscriptionMessage::Unpaid),
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => None,
        }
    }
}

/// Single-slot memo for [`Permissions::derive`].
///
/// Re-derives only when the extracted inputs differ from the last call.
#[derive(Debug, Default)]
pub struct PermissionCache {
    last: Mutex<Option<(PermissionInputs, Permissions)>>,
    derivations: AtomicU64,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, snapshot: &AuthSnapshot) -> Permissions {
        let inputs = PermissionInputs::from_snapshot(snapshot);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((cached_inputs, cached)) = last.as_ref() {
            if *cached_inputs == inputs {
                return cached.clone();
            }
        }

        let derived = Permissions::derive(&inputs);
        self.derivations.fetch_add(1, Ordering::Relaxed);
        *last = Some((inputs, derived.clone()));
        derived
    }

    /// How many times the cache has had to re-derive.
    pub fn derivations(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }
}
