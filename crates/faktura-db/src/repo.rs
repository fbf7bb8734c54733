//! Repository traits
//!
//! Define async repository interfaces for database operations. Mutations
//! that participate in lifecycle races are expressed as conditional updates
//! and report whether a row actually changed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>>;

    /// Find a user by email
    async fn find_by_email(&self, email: &str) -> DbResult<Option<UserRow>>;

    /// Create a new user
    async fn create(&self, user: CreateUser) -> DbResult<UserRow>;

    /// Update the user's gateway customer reference
    async fn update_gateway_customer_id(&self, id: Uuid, customer_id: &str) -> DbResult<()>;
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
}

/// Subscription repository trait
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>>;

    /// Find the newest subscription for a user, regardless of status.
    ///
    /// The newest row is the one that counts for entitlement; older rows are
    /// history and are never deleted.
    async fn find_latest_by_user(&self, user_id: Uuid) -> DbResult<Option<SubscriptionRow>>;

    /// Find a subscription by the gateway's subscription ID
    async fn find_by_gateway_id(&self, gateway_id: &str) -> DbResult<Option<SubscriptionRow>>;

    /// List rows due for expiry: active, marked for non-renewal, and past
    /// their period end at `now`
    async fn find_expired_active(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>>;

    /// Create a new subscription
    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow>;

    /// Set the cancel-at-period-end flag
    async fn set_cancel_at_period_end(&self, id: Uuid, cancel: bool) -> DbResult<()>;

    /// Transition active -> expired, but only if the row is still active and
    /// still past its period end at write time. Returns whether a row
    /// changed; repeating the call on an expired row writes nothing.
    async fn expire_if_due(&self, id: Uuid, now: DateTime<Utc>) -> DbResult<bool>;

    /// Transition active -> past_due for the row owning `gateway_id`.
    /// Returns whether a row changed; replays are no-ops.
    async fn mark_past_due_if_active(&self, gateway_id: &str) -> DbResult<bool>;

    /// Transition past_due -> active for the row owning `gateway_id`.
    /// Returns whether a row changed; replays are no-ops.
    async fn reactivate_if_past_due(&self, gateway_id: &str) -> DbResult<bool>;

    /// Advance the paid window for the row owning `gateway_id` to the
    /// gateway-confirmed period, but only forward and only while the row is
    /// active or past_due. Returns whether a row changed; redelivering the
    /// same renewal writes nothing.
    async fn advance_period(
        &self,
        gateway_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DbResult<bool>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub gateway_subscription_id: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
}
