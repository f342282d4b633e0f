//! Read-only view of the session state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use chamberhub_core::{
    Business, Chamber, ChamberMembership, SubscriptionSnapshot, User, UserProfile,
};

use crate::membership::select_primary;

/// Rows fetched for a signed-in user. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub profile: Option<UserProfile>,
    pub memberships: Vec<ChamberMembership>,
    pub subscription: Option<SubscriptionSnapshot>,
    pub business: Option<Business>,
}

/// Everything consumers may know about the current session.
///
/// Built only through the constructors below so the derived fields
/// (`primary_membership`, `current_chamber`, trial fields) always agree with
/// the rows they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub loading: bool,
    pub user_profile: Option<UserProfile>,
    pub user_chambers: Vec<ChamberMembership>,
    pub primary_membership: Option<ChamberMembership>,
    pub current_business: Option<Business>,
    pub current_chamber: Option<Chamber>,
    pub subscription: Option<SubscriptionSnapshot>,
    pub is_trialing: bool,
    pub trial_days_remaining: Option<i64>,
    pub has_active_subscription: bool,
}

impl AuthSnapshot {
    /// State before the identity service has answered.
    pub fn unresolved() -> Self {
        Self {
            loading: true,
            ..Self::signed_out()
        }
    }

    /// Known to be unauthenticated.
    pub fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
            user_profile: None,
            user_chambers: Vec::new(),
            primary_membership: None,
            current_business: None,
            current_chamber: None,
            subscription: None,
            is_trialing: false,
            trial_days_remaining: None,
            has_active_subscription: false,
        }
    }

    /// A user is known but their rows have not arrived yet.
    pub fn resolving(user: User) -> Self {
        Self {
            user: Some(user),
            ..Self::unresolved()
        }
    }

    /// A user and their fetched rows.
    pub fn resolved(user: User, data: SessionData, now: DateTime<Utc>) -> Self {
        let primary_membership = select_primary(&data.memberships).cloned();
        let current_chamber = primary_membership.as_ref().and_then(|m| m.chamber.clone());

        let (is_trialing, trial_days_remaining, has_active_subscription) =
            match &data.subscription {
                Some(sub) => (sub.is_trialing(), sub.trial_days_remaining(now), sub.is_active()),
                None => (false, None, false),
            };

        Self {
            user: Some(user),
            loading: false,
            user_profile: data.profile,
            user_chambers: data.memberships,
            primary_membership,
            current_business: data.business,
            current_chamber,
            subscription: data.subscription,
            is_trialing,
            trial_days_remaining,
            has_active_subscription,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self::unresolved()
    }
}

#[cfg(test)]
mod tests {
    use chamberhub_core::{
        ChamberId, MembershipRole, Plan, PlanFeatures, PlanLimits, SubscriptionStatus, UserId,
    };
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap()
    }

    #[test]
    fn resolved_snapshot_derives_chamber_from_primary_membership() {
        let user = User::new(UserId::new(), "ana@example.com");
        let chamber = Chamber::new(ChamberId::new(), "Riverside Chamber", "riverside");
        let data = SessionData {
            memberships: vec![ChamberMembership::new(
                user.id,
                chamber.clone(),
                MembershipRole::Staff,
            )],
            ..SessionData::default()
        };

        let snap = AuthSnapshot::resolved(user, data, now());
        assert!(!snap.loading);
        assert_eq!(snap.current_chamber, Some(chamber));
        assert_eq!(snap.primary_membership.unwrap().role, MembershipRole::Staff);
    }

    #[test]
    fn trial_fields_follow_the_subscription() {
        let user = User::new(UserId::new(), "ben@example.com");
        let sub = SubscriptionSnapshot::new(
            SubscriptionStatus::Trialing,
            Plan::new("Growth", PlanFeatures::default(), PlanLimits::default()),
        )
        .with_trial_end(now() + Duration::days(6));
        let data = SessionData {
            subscription: Some(sub),
            ..SessionData::default()
        };

        let snap = AuthSnapshot::resolved(user, data, now());
        assert!(snap.is_trialing);
        assert_eq!(snap.trial_days_remaining, Some(6));
        assert!(!snap.has_active_subscription);
    }

    #[test]
    fn unresolved_and_resolving_are_loading() {
        assert!(AuthSnapshot::unresolved().loading);
        let user = User::new(UserId::new(), "cy@example.com");
        let snap = AuthSnapshot::resolving(user);
        assert!(snap.loading);
        assert!(snap.is_authenticated());
        assert!(!AuthSnapshot::signed_out().loading);
    }
}
