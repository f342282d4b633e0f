//! `chamberhub-core` — records consumed by the session layer.
//!
//! Plain data only: identifiers, profile/membership/subscription shapes, and
//! their small derived helpers. No I/O.

pub mod chamber;
pub mod error;
pub mod id;
pub mod profile;
pub mod subscription;

pub use chamber::{
    Business, Chamber, ChamberMembership, MembershipRole, MembershipRows, MembershipStatus,
};
pub use error::DomainError;
pub use id::{BusinessId, ChamberId, SubscriptionId, UserId};
pub use profile::{ProfileRole, User, UserProfile};
pub use subscription::{
    Plan, PlanFeatures, PlanLimits, SubscriptionSnapshot, SubscriptionStatus, UNLIMITED,
};
