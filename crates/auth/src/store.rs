//! Relational data-store boundary.
//!
//! Every query is filtered by the signed-in user's id. Row-level
//! authorization is enforced by the platform, not here.

use async_trait::async_trait;

use chamberhub_core::{Business, ChamberMembership, SubscriptionSnapshot, UserId, UserProfile};

use crate::StoreError;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `user_profiles` row for the user.
    async fn user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, StoreError>;

    /// `chamber_memberships` rows joined with `chambers`, in backend order.
    async fn chamber_memberships(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ChamberMembership>, StoreError>;

    /// Current subscription and plan for the user's account.
    async fn subscription(&self, user_id: UserId)
    -> Result<Option<SubscriptionSnapshot>, StoreError>;

    /// The business the user operates, if they own one.
    async fn current_business(&self, user_id: UserId) -> Result<Option<Business>, StoreError>;
}
