//! `chamberhub-auth` — session state, capability derivation, and route gating.
//!
//! This crate is decoupled from any HTTP client, storage schema, or router.
//! The hosted identity service and data store are reached only through the
//! [`IdentityService`] and [`ProfileStore`] traits.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod identity;
pub mod membership;
pub mod memory;
pub mod permissions;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use context::AuthContext;
pub use error::{AuthError, StoreError};
pub use gate::{
    AccessDenied, DenialKind, GateDecision, GateRequirements, GateState, NavigationIntent,
    NavigationState, RouteGate, SafeAction,
};
pub use identity::{
    AuthEvent, AuthStateChange, IdentityService, OAuthProvider, OAuthRedirect, Session,
    SignUpOutcome,
};
pub use membership::select_primary;
pub use memory::{InMemoryBackend, Table};
pub use permissions::{
    Feature, PermissionCache, PermissionInputs, Permissions, SubscriptionMessage,
};
pub use snapshot::{AuthSnapshot, SessionData};
pub use store::ProfileStore;
