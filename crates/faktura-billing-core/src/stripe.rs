//! Stripe payment gateway implementation

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use faktura_types::PlanId;

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{
    CheckoutSession, GatewayCancellation, GatewayCustomer, GatewaySubscription, PaymentGateway,
    PaymentIntent,
};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe payment gateway
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    config: BillingConfig,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(config: BillingConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    /// Make authenticated request to Stripe
    async fn stripe_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<T, BillingError> {
        let url = format!("{STRIPE_API_BASE}{endpoint}");

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.stripe_secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            BillingError::Gateway(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            return Err(BillingError::Gateway(format!("Stripe API error: {status}")));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::Internal(e.to_string())
        })
    }

}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self))]
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
    ) -> Result<GatewayCustomer, BillingError> {
        debug!(email = %email, "Creating Stripe customer");

        let mut form: Vec<(&str, &str)> = vec![("email", email)];
        if let Some(n) = name {
            form.push(("name", n));
        }

        let customer: StripeCustomer = self
            .stripe_request(reqwest::Method::POST, "/customers", Some(&form))
            .await?;

        Ok(GatewayCustomer {
            id: customer.id,
            email: customer.email,
        })
    }

    #[instrument(skip(self))]
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        plan: PlanId,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError> {
        debug!(customer_id = %customer_id, plan = %plan, "Creating checkout session");

        let price_id = self.config.price_id(plan)?;
        let mode = if plan.is_recurring() {
            "subscription"
        } else {
            "payment"
        };

        let form = [
            ("customer", customer_id),
            ("mode", mode),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
        ];

        let session: StripeCheckoutSession = self
            .stripe_request(reqwest::Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url.unwrap_or_default(),
        })
    }

    #[instrument(skip(self))]
    async fn create_subscription(
        &self,
        customer_id: &str,
        plan: PlanId,
    ) -> Result<GatewaySubscription, BillingError> {
        debug!(customer_id = %customer_id, plan = %plan, "Creating Stripe subscription");

        let price_id = self.config.price_id(plan)?;

        // Incomplete until the first charge is confirmed client-side
        let form = [
            ("customer", customer_id),
            ("items[0][price]", price_id),
            ("payment_behavior", "default_incomplete"),
            ("expand[0]", "latest_invoice.payment_intent"),
        ];

        let sub: StripeSubscription = self
            .stripe_request(reqwest::Method::POST, "/subscriptions", Some(&form))
            .await?;

        let client_secret = sub
            .latest_invoice
            .as_ref()
            .and_then(|inv| inv.payment_intent.as_ref())
            .and_then(|pi| pi.client_secret.clone());

        Ok(GatewaySubscription {
            gateway_subscription_id: sub.id,
            client_secret,
            status: sub.status,
        })
    }

    #[instrument(skip(self))]
    async fn create_payment_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
    ) -> Result<PaymentIntent, BillingError> {
        debug!(amount = amount_minor_units, currency = %currency, "Creating payment intent");

        let amount = amount_minor_units.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let intent: StripePaymentIntent = self
            .stripe_request(reqwest::Method::POST, "/payment_intents", Some(&form))
            .await?;

        Ok(PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn cancel_at_period_end(
        &self,
        gateway_subscription_id: &str,
    ) -> Result<GatewayCancellation, BillingError> {
        debug!(subscription_id = %gateway_subscription_id, "Requesting cancel at period end");

        // Not DELETE: the subscription keeps running until the period ends
        let form = [("cancel_at_period_end", "true")];

        let sub: StripeSubscription = self
            .stripe_request(
                reqwest::Method::POST,
                &format!("/subscriptions/{gateway_subscription_id}"),
                Some(&form),
            )
            .await?;

        let current_period_end = Utc.timestamp_opt(sub.current_period_end, 0).single();

        Ok(GatewayCancellation {
            status: sub.status,
            cancel_at_period_end: sub.cancel_at_period_end,
            current_period_end,
        })
    }
}

/// Convert a Stripe unix timestamp into a UTC instant
pub(crate) fn timestamp_to_utc(ts: i64) -> Result<DateTime<Utc>, BillingError> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| BillingError::Webhook(format!("invalid timestamp: {ts}")))
}

// Stripe API response types

/// Stripe customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCustomer {
    /// Customer ID
    pub id: String,
    /// Customer email
    pub email: Option<String>,
    /// Customer name
    pub name: Option<String>,
}

/// Stripe subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    /// Subscription ID
    pub id: String,
    /// Customer ID
    pub customer: String,
    /// Subscription status
    pub status: String,
    /// Current period start (Unix timestamp)
    pub current_period_start: i64,
    /// Current period end (Unix timestamp)
    pub current_period_end: i64,
    /// Whether subscription cancels at period end
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Latest invoice, when expanded
    #[serde(default)]
    pub latest_invoice: Option<StripeExpandedInvoice>,
}

/// Invoice with an expanded payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeExpandedInvoice {
    /// Invoice ID
    pub id: String,
    /// Expanded payment intent
    #[serde(default)]
    pub payment_intent: Option<StripePaymentIntent>,
}

/// Stripe payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePaymentIntent {
    /// Payment intent ID
    pub id: String,
    /// Client secret
    pub client_secret: Option<String>,
}

/// Stripe checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session ID
    pub id: String,
    /// Checkout URL
    pub url: Option<String>,
    /// Customer ID
    pub customer: Option<String>,
    /// Subscription ID (after completion)
    pub subscription: Option<String>,
}

/// Stripe invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoice {
    /// Invoice ID
    pub id: String,
    /// Customer ID
    pub customer: String,
    /// Subscription the invoice belongs to
    pub subscription: Option<String>,
    /// Invoice status
    pub status: Option<String>,
    /// Amount paid in cents
    pub amount_paid: i64,
    /// Currency
    pub currency: String,
    /// Period start (Unix timestamp)
    pub period_start: i64,
    /// Period end (Unix timestamp)
    pub period_end: i64,
}
