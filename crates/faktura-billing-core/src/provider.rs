//! Payment gateway abstraction

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use faktura_types::PlanId;

use crate::BillingError;

/// Payment gateway trait
///
/// Abstracts the payment processor so the lifecycle can be exercised against
/// a mock. All calls are blocking round-trips from the caller's perspective;
/// on failure the caller leaves local state unchanged.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway customer for a user
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<GatewayCustomer, BillingError>;

    /// Create a hosted checkout session for a plan
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        plan: PlanId,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError>;

    /// Create a recurring subscription for a customer
    async fn create_subscription(
        &self,
        customer_id: &str,
        plan: PlanId,
    ) -> Result<GatewaySubscription, BillingError>;

    /// Create a payment intent for a one-time purchase
    async fn create_payment_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
    ) -> Result<PaymentIntent, BillingError>;

    /// Ask the gateway to stop renewing a subscription at period end.
    /// The remote subscription stays active until the running period ends.
    async fn cancel_at_period_end(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewayCancellation, BillingError>;
}

/// A gateway-side customer
#[derive(Debug, Clone)]
pub struct GatewayCustomer {
    /// Gateway customer ID
    pub id: String,
    /// Customer email
    pub email: Option<String>,
}

/// Hosted checkout session
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// Session ID
    pub session_id: String,
    /// Checkout URL
    pub url: String,
}

/// A gateway-side subscription, freshly created
#[derive(Debug, Clone)]
pub struct GatewaySubscription {
    /// The gateway's subscription object id
    pub gateway_subscription_id: String,
    /// Client secret for confirming the first payment
    pub client_secret: Option<String>,
    /// Gateway-reported status
    pub status: String,
}

/// One-time payment intent
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Payment intent ID
    pub id: String,
    /// Client secret for confirming the payment
    pub client_secret: Option<String>,
}

/// Gateway acknowledgment of a cancel-at-period-end request
#[derive(Debug, Clone)]
pub struct GatewayCancellation {
    /// Gateway-reported status (stays "active" until the period ends)
    pub status: String,
    /// Confirmed cancel-at-period-end flag
    pub cancel_at_period_end: bool,
    /// When access ends, as the gateway sees it
    pub current_period_end: Option<DateTime<Utc>>,
}
