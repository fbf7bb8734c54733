//! Billing errors

use faktura_types::PlanId;
use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Unknown plan id reached the billing layer
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// No gateway price is configured for a plan
    #[error("no price configured for plan: {0}")]
    MissingPriceId(PlanId),

    /// The plan cannot be bought (free tier)
    #[error("plan is not purchasable: {0}")]
    NotPurchasable(PlanId),

    /// No subscription exists for the user
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// A record exists but is not in a cancelable state
    #[error("subscription cannot be canceled: {0}")]
    NotCancelable(&'static str),

    /// The subscription has no gateway reference, so it cannot be canceled
    /// remotely
    #[error("subscription has no gateway subscription id")]
    MissingGatewayReference,

    /// Payment gateway call failed; local state was left unchanged
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Webhook verification or parsing error
    #[error("webhook error: {0}")]
    Webhook(String),

    /// The gateway acknowledged a change but the local write failed; the
    /// store will heal on the next re-fetch
    #[error("reconciliation needed: {0}")]
    Reconciliation(String),

    /// Database error
    #[error("database error: {0}")]
    Store(#[from] faktura_db::DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Configuration errors must abort loudly, never fall back to a default
    /// plan
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnknownPlan(_) | Self::MissingPriceId(_))
    }

    /// Gateway errors are recoverable: the caller may retry, local state is
    /// untouched
    pub fn is_gateway_error(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }
}

impl From<faktura_types::PlanParseError> for BillingError {
    fn from(e: faktura_types::PlanParseError) -> Self {
        Self::UnknownPlan(e.0)
    }
}
