//! Protected-route gating.
//!
//! [`RouteGate::evaluate`] is a synchronous decision over the current
//! snapshot. It never waits on anything itself; it only reflects what the
//! auth context has resolved so far.

use serde::Serialize;

use chamberhub_core::MembershipRole;

use crate::{AuthConfig, AuthSnapshot};

/// Static requirements a protected view declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateRequirements {
    pub require_chamber: bool,
    pub require_business: bool,
    /// Minimum primary-membership role. Implies `require_chamber`.
    pub minimum_role: Option<MembershipRole>,
}

impl GateRequirements {
    /// Signed-in user, nothing else.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn chamber() -> Self {
        Self {
            require_chamber: true,
            ..Self::default()
        }
    }

    pub fn business() -> Self {
        Self {
            require_business: true,
            ..Self::default()
        }
    }

    pub fn with_minimum_role(mut self, role: MembershipRole) -> Self {
        self.minimum_role = Some(role);
        self
    }

    fn needs_chamber(&self) -> bool {
        self.require_chamber || self.minimum_role.is_some()
    }
}

/// Where the gate's session state currently sits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Unresolved,
    Unauthenticated,
    AuthenticatedInsufficient,
    AuthenticatedSufficient,
}

/// State handed to the router alongside a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    /// The path (with query) originally requested.
    pub from: String,
}

/// A navigation the caller's router should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationIntent {
    pub path: String,
    pub state: Option<NavigationState>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
}

/// Link offered on a denial view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeAction {
    pub label: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialKind {
    /// The user belongs to no chamber at all.
    NoChamberMembership,
    /// The user has membership rows, but none gives usable chamber access.
    ChamberAccessUnavailable,
    /// The user has a chamber but their role there is too low.
    InsufficientRole {
        required: MembershipRole,
        actual: MembershipRole,
    },
    /// The view needs a business profile the user has not set up.
    NoBusiness,
}

/// Explanatory denial view contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDenied {
    pub kind: DenialKind,
    pub title: String,
    pub message: String,
    pub action: SafeAction,
}

/// Outcome of gating one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// No auth context mounted yet; neutral placeholder, no redirect.
    Pending,
    /// Session still resolving; loading placeholder.
    Loading,
    Redirect(NavigationIntent),
    Denied(AccessDenied),
    Render,
}

impl GateDecision {
    pub fn state(&self) -> GateState {
        match self {
            GateDecision::Pending | GateDecision::Loading => GateState::Unresolved,
            GateDecision::Redirect(_) => GateState::Unauthenticated,
            GateDecision::Denied(_) => GateState::AuthenticatedInsufficient,
            GateDecision::Render => GateState::AuthenticatedSufficient,
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self, GateDecision::Render)
    }
}

/// Access check guarding protected views.
#[derive(Debug, Clone, Default)]
pub struct RouteGate {
    config: AuthConfig,
}

impl RouteGate {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Decide what to show for `requested_path`.
    ///
    /// `snapshot` is `None` when no auth context is mounted.
    pub fn evaluate(
        &self,
        snapshot: Option<&AuthSnapshot>,
        requested_path: &str,
        requirements: &GateRequirements,
    ) -> GateDecision {
        let Some(snapshot) = snapshot else {
            return GateDecision::Pending;
        };

        if snapshot.loading {
            return GateDecision::Loading;
        }

        if snapshot.user.is_none() {
            tracing::debug!(path = requested_path, "redirecting unauthenticated visitor to login");
            return GateDecision::Redirect(self.login_redirect(requested_path));
        }

        if requirements.needs_chamber() {
            if snapshot.user_chambers.is_empty() {
                return GateDecision::Denied(self.denied(DenialKind::NoChamberMembership));
            }
            let (Some(_), Some(primary)) = (&snapshot.current_chamber, &snapshot.primary_membership)
            else {
                return GateDecision::Denied(self.denied(DenialKind::ChamberAccessUnavailable));
            };
            if let Some(required) = requirements.minimum_role {
                if !primary.role.at_least(required) {
                    return GateDecision::Denied(self.denied(DenialKind::InsufficientRole {
                        required,
                        actual: primary.role,
                    }));
                }
            }
        }

        if requirements.require_business && snapshot.current_business.is_none() {
            return GateDecision::Denied(self.denied(DenialKind::NoBusiness));
        }

        GateDecision::Render
    }

    /// Login redirect carrying `requested_path` in both query and state.
    pub fn login_redirect(&self, requested_path: &str) -> NavigationIntent {
        let path = format!(
            "{}?{}={}",
            self.config.login_path,
            self.config.redirect_param,
            urlencoding::encode(requested_path)
        );
        NavigationIntent {
            path,
            state: Some(NavigationState {
                from: requested_path.to_string(),
            }),
            replace: true,
        }
    }

    /// Where to go after a successful sign-in.
    ///
    /// Prefers the navigation state, then the query parameter. Anything that
    /// is not a same-site relative path (or points back at the login page)
    /// falls back to the default route.
    pub fn post_login_destination(
        &self,
        redirect_query: Option<&str>,
        state: Option<&NavigationState>,
    ) -> String {
        let from_state = state.map(|s| s.from.clone());
        let from_query = redirect_query
            .and_then(|q| urlencoding::decode(q).ok())
            .map(|q| q.into_owned());

        from_state
            .into_iter()
            .chain(from_query)
            .find(|candidate| self.is_safe_return_path(candidate))
            .unwrap_or_else(|| self.config.default_route.clone())
    }

    fn is_safe_return_path(&self, path: &str) -> bool {
        let login = self.config.login_path.as_str();
        path.starts_with('/')
            && !path.starts_with("//")
            && !path.contains('\\')
            && !path.contains("://")
            && path != login
            && !path.starts_with(&format!("{login}?"))
    }

    fn denied(&self, kind: DenialKind) -> AccessDenied {
        let (title, message) = match kind {
            DenialKind::NoChamberMembership => (
                "No chamber membership",
                "You are not a member of any chamber yet. Ask your chamber to invite you, \
                 or join one from your dashboard."
                    .to_string(),
            ),
            DenialKind::ChamberAccessUnavailable => (
                "Chamber access unavailable",
                "Your chamber membership does not currently give you access to this page. \
                 It may be pending approval or suspended."
                    .to_string(),
            ),
            DenialKind::InsufficientRole { required, actual } => (
                "Insufficient permissions",
                format!(
                    "This page requires the {required} role in your chamber; you are {}.",
                    with_article(actual)
                ),
            ),
            DenialKind::NoBusiness => (
                "Business profile required",
                "This page needs a business profile. Create or claim your business listing \
                 to continue."
                    .to_string(),
            ),
        };

        AccessDenied {
            kind,
            title: title.to_string(),
            message,
            action: SafeAction {
                label: "Go to dashboard".to_string(),
                path: self.config.default_route.clone(),
            },
        }
    }
}

fn with_article(role: MembershipRole) -> String {
    match role {
        MembershipRole::Admin => "an admin".to_string(),
        other => format!("a {other}"),
    }
}

#[cfg(test)]
mod tests {
    use chamberhub_core::{
        Business, BusinessId, Chamber, ChamberId, ChamberMembership, MembershipStatus, User,
        UserId,
    };
    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::SessionData;

    fn user() -> User {
        User::new(UserId::new(), "dee@example.com")
    }

    fn member_of(user: &User, role: MembershipRole) -> ChamberMembership {
        let chamber = Chamber::new(ChamberId::new(), "Harbor Chamber", "harbor");
        ChamberMembership::new(user.id, chamber, role)
    }

    fn resolved(user: User, data: SessionData) -> AuthSnapshot {
        AuthSnapshot::resolved(user, data, Utc::now())
    }

    #[test]
    fn missing_context_is_pending_not_loading() {
        let gate = RouteGate::default();
        let decision = gate.evaluate(None, "/events", &GateRequirements::chamber());
        assert_eq!(decision, GateDecision::Pending);
        assert_eq!(decision.state(), GateState::Unresolved);
    }

    #[test]
    fn loading_never_redirects() {
        let gate = RouteGate::default();
        for snapshot in [AuthSnapshot::unresolved(), AuthSnapshot::resolving(user())] {
            let decision = gate.evaluate(Some(&snapshot), "/events", &GateRequirements::business());
            assert_eq!(decision, GateDecision::Loading);
        }
    }

    #[test]
    fn unauthenticated_redirect_preserves_path_twice() {
        let gate = RouteGate::default();
        let snapshot = AuthSnapshot::signed_out();
        let decision = gate.evaluate(
            Some(&snapshot),
            "/members/42?tab=events",
            &GateRequirements::authenticated(),
        );

        let GateDecision::Redirect(intent) = decision else {
            panic!("expected redirect, got {decision:?}");
        };
        assert_eq!(intent.path, "/login?redirect=%2Fmembers%2F42%3Ftab%3Devents");
        assert_eq!(intent.state.unwrap().from, "/members/42?tab=events");
        assert!(intent.replace);
    }

    #[test]
    fn zero_memberships_gets_the_no_membership_variant() {
        let gate = RouteGate::default();
        let snapshot = resolved(user(), SessionData::default());
        let decision = gate.evaluate(Some(&snapshot), "/directory", &GateRequirements::chamber());

        let GateDecision::Denied(denied) = decision else {
            panic!("expected denial, got {decision:?}");
        };
        assert_eq!(denied.kind, DenialKind::NoChamberMembership);
        assert!(denied.message.contains("not a member of any chamber"));
        assert_eq!(denied.action.path, "/dashboard");
    }

    #[test]
    fn inactive_memberships_get_the_access_unavailable_variant() {
        let gate = RouteGate::default();
        let u = user();
        let data = SessionData {
            memberships: vec![
                member_of(&u, MembershipRole::Admin).with_status(MembershipStatus::Suspended),
            ],
            ..SessionData::default()
        };
        let snapshot = resolved(u, data);
        let decision = gate.evaluate(Some(&snapshot), "/directory", &GateRequirements::chamber());

        let GateDecision::Denied(denied) = decision else {
            panic!("expected denial, got {decision:?}");
        };
        assert_eq!(denied.kind, DenialKind::ChamberAccessUnavailable);
        assert!(!denied.message.contains("not a member of any chamber"));
    }

    #[test]
    fn minimum_role_is_enforced_on_primary_membership() {
        let gate = RouteGate::default();
        let u = user();
        let data = SessionData {
            memberships: vec![member_of(&u, MembershipRole::Member)],
            ..SessionData::default()
        };
        let snapshot = resolved(u, data);
        let requirements = GateRequirements::chamber().with_minimum_role(MembershipRole::Staff);
        let decision = gate.evaluate(Some(&snapshot), "/admin/events", &requirements);

        let GateDecision::Denied(denied) = decision else {
            panic!("expected denial, got {decision:?}");
        };
        assert_eq!(
            denied.kind,
            DenialKind::InsufficientRole {
                required: MembershipRole::Staff,
                actual: MembershipRole::Member,
            }
        );
        assert!(denied.message.contains("a member"));
    }

    #[test]
    fn business_requirement_has_its_own_denial() {
        let gate = RouteGate::default();
        let u = user();
        let data = SessionData {
            memberships: vec![member_of(&u, MembershipRole::Member)],
            ..SessionData::default()
        };
        let snapshot = resolved(u, data);
        let requirements = GateRequirements {
            require_chamber: true,
            require_business: true,
            minimum_role: None,
        };
        let decision = gate.evaluate(Some(&snapshot), "/business/qr", &requirements);
        assert_eq!(decision.state(), GateState::AuthenticatedInsufficient);

        let GateDecision::Denied(denied) = decision else {
            panic!("expected denial, got {decision:?}");
        };
        assert_eq!(denied.kind, DenialKind::NoBusiness);
    }

    #[test]
    fn satisfied_requirements_render() {
        let gate = RouteGate::default();
        let u = user();
        let membership = member_of(&u, MembershipRole::Admin);
        let business = Business::new(BusinessId::new(), membership.chamber_id, u.id, "Dee's Bakery");
        let data = SessionData {
            memberships: vec![membership],
            business: Some(business),
            ..SessionData::default()
        };
        let snapshot = resolved(u, data);
        let requirements = GateRequirements {
            require_chamber: true,
            require_business: true,
            minimum_role: Some(MembershipRole::Staff),
        };
        assert!(gate.evaluate(Some(&snapshot), "/business/qr", &requirements).is_render());
    }

    #[test]
    fn post_login_prefers_state_then_query_then_default() {
        let gate = RouteGate::default();
        let state = NavigationState {
            from: "/events/7".to_string(),
        };
        assert_eq!(
            gate.post_login_destination(Some("%2Fdirectory"), Some(&state)),
            "/events/7"
        );
        assert_eq!(gate.post_login_destination(Some("%2Fdirectory"), None), "/directory");
        assert_eq!(gate.post_login_destination(None, None), "/dashboard");
    }

    #[test]
    fn post_login_rejects_offsite_and_login_loops() {
        let gate = RouteGate::default();
        for bad in ["https://evil.example", "//evil.example", "/login", "/login?redirect=%2F", "events"] {
            assert_eq!(
                gate.post_login_destination(Some(urlencoding::encode(bad).as_ref()), None),
                "/dashboard",
                "{bad}"
            );
        }
    }

    fn requirements_strategy() -> impl Strategy<Value = GateRequirements> {
        (
            any::<bool>(),
            any::<bool>(),
            prop_oneof![
                Just(None),
                Just(Some(MembershipRole::Member)),
                Just(Some(MembershipRole::Staff)),
                Just(Some(MembershipRole::Admin)),
            ],
        )
            .prop_map(|(require_chamber, require_business, minimum_role)| GateRequirements {
                require_chamber,
                require_business,
                minimum_role,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]

        #[test]
        fn loading_sessions_only_ever_show_the_placeholder(
            path in "/[a-z0-9/?=&]{0,32}",
            signed_in in any::<bool>(),
            requirements in requirements_strategy(),
        ) {
            let snapshot = if signed_in {
                AuthSnapshot::resolving(user())
            } else {
                AuthSnapshot::unresolved()
            };
            let decision = RouteGate::default().evaluate(Some(&snapshot), &path, &requirements);
            prop_assert_eq!(decision, GateDecision::Loading);
        }

        #[test]
        fn signed_out_sessions_redirect_with_path_preserved(
            path in "/[a-zA-Z0-9/?=&%-]{0,48}",
            requirements in requirements_strategy(),
        ) {
            let gate = RouteGate::default();
            let decision = gate.evaluate(Some(&AuthSnapshot::signed_out()), &path, &requirements);
            let GateDecision::Redirect(intent) = decision else {
                return Err(TestCaseError::fail("expected redirect"));
            };

            let state = intent.state.clone().unwrap();
            prop_assert_eq!(&state.from, &path);

            let query = intent.path.strip_prefix("/login?redirect=").unwrap();
            prop_assert_eq!(urlencoding::decode(query).unwrap().into_owned(), path.clone());
        }
    }
}
