//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{PlanId, UserId};

/// Unique subscription identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    /// Create a new random subscription ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid period is running (includes canceled-but-not-yet-expired)
    Active,
    /// Canceled immediately by the gateway
    Canceled,
    /// Paid period is over; entitlement reverted to free
    Expired,
    /// A renewal charge failed; access continues as a grace period
    PastDue,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
            Self::Expired => write!(f, "expired"),
            Self::PastDue => write!(f, "past_due"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            "past_due" => Ok(Self::PastDue),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// Error parsing a subscription status string
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown subscription status: {0}")]
pub struct StatusParseError(pub String);

/// A user's subscription record.
///
/// One user may have many rows over time; only the newest counts for
/// entitlement. Rows are never hard-deleted. `current_period_end` is written
/// at transition time and is the single source of truth for when access
/// ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription ID
    pub id: SubscriptionId,
    /// User who owns the subscription
    pub user_id: UserId,
    /// Purchased plan
    pub plan: PlanId,
    /// Lifecycle status
    pub status: SubscriptionStatus,
    /// Start of the paid-for window
    pub current_period_start: DateTime<Utc>,
    /// End of the paid-for window; never recomputed at read time
    pub current_period_end: DateTime<Utc>,
    /// Non-renewal was requested; the record stays active until the period
    /// end passes
    pub cancel_at_period_end: bool,
    /// The gateway's own subscription object, required for cancellation
    pub gateway_subscription_id: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
}
