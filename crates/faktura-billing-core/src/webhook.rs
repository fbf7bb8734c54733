//! Stripe webhook handling
//!
//! Verifies the `Stripe-Signature` header and parses the payload into typed
//! events. Gateways redeliver events; the lifecycle layer makes replays
//! no-ops, this module only authenticates and decodes.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use crate::error::BillingError;
use crate::stripe::{timestamp_to_utc, StripeInvoice, StripeSubscription};

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutSessionCompleted,
    /// Gateway subscription created
    SubscriptionCreated,
    /// Gateway subscription updated
    SubscriptionUpdated,
    /// Gateway subscription deleted
    SubscriptionDeleted,
    /// Renewal charge succeeded
    InvoicePaymentSucceeded,
    /// Renewal charge failed
    InvoicePaymentFailed,
    /// Unknown event type
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            // Stripe has used both names for the same event
            "invoice.payment_succeeded" | "invoice.paid" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Gateway-assigned event ID
    pub id: String,
    /// Event type
    pub event_type: WebhookEventType,
    /// Event data
    pub data: WebhookEventData,
    /// When the event was created (Unix timestamp)
    pub created: i64,
}

/// Webhook event data
#[derive(Debug, Clone)]
pub enum WebhookEventData {
    /// Checkout session data
    CheckoutSession(CheckoutSessionData),
    /// Subscription data
    Subscription(SubscriptionEventData),
    /// Invoice data
    Invoice(InvoiceEventData),
    /// Raw JSON for unknown events
    Raw(serde_json::Value),
}

/// Checkout session completed data
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    /// Session ID
    pub session_id: String,
    /// Customer ID
    pub customer_id: String,
    /// Subscription ID, present for recurring checkouts
    pub subscription_id: Option<String>,
}

/// Subscription event data
#[derive(Debug, Clone)]
pub struct SubscriptionEventData {
    /// The gateway's subscription ID
    pub gateway_subscription_id: String,
    /// Customer ID
    pub customer_id: String,
    /// Gateway-reported status
    pub status: String,
    /// Current period start
    pub period_start: chrono::DateTime<Utc>,
    /// Current period end
    pub period_end: chrono::DateTime<Utc>,
    /// Whether it cancels at period end
    pub cancel_at_period_end: bool,
}

/// Invoice event data
#[derive(Debug, Clone)]
pub struct InvoiceEventData {
    /// Invoice ID
    pub invoice_id: String,
    /// Customer ID
    pub customer_id: String,
    /// The subscription the invoice charges for, if any
    pub gateway_subscription_id: Option<String>,
    /// Invoice status
    pub status: String,
    /// Amount in minor units
    pub amount_minor_units: i64,
    /// Currency
    pub currency: String,
    /// Start of the period the invoice charges for
    pub period_start: chrono::DateTime<Utc>,
    /// End of the period the invoice charges for
    pub period_end: chrono::DateTime<Utc>,
}

/// Webhook handler for verifying and parsing Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
}

impl WebhookHandler {
    /// Create a new webhook handler
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify and parse a webhook payload
    #[instrument(skip(self, payload, signature))]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        self.verify_signature(payload, signature)?;

        let raw_event: RawStripeEvent =
            serde_json::from_slice(payload).map_err(|e| BillingError::Webhook(e.to_string()))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type, "Parsed webhook event");

        let event_type = WebhookEventType::from(raw_event.event_type.as_str());
        let data = Self::parse_event_data(&event_type, raw_event.data.object)?;

        Ok(WebhookEvent {
            id: raw_event.id,
            event_type,
            data,
            created: raw_event.created,
        })
    }

    /// Verify Stripe webhook signature
    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), BillingError> {
        // Parse signature header: t=timestamp,v1=signature
        let mut timestamp: Option<&str> = None;
        let mut sig_v1: Option<&str> = None;

        for part in signature.split(',') {
            if let Some((key, value)) = part.split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => sig_v1 = Some(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::Webhook("Missing timestamp".to_string())
        })?;

        let sig_v1 = sig_v1.ok_or_else(|| {
            warn!("Missing v1 signature in webhook signature");
            BillingError::Webhook("Missing signature".to_string())
        })?;

        let signed_payload = format!(
            "{}.{}",
            timestamp,
            std::str::from_utf8(payload)
                .map_err(|_| BillingError::Webhook("Invalid payload encoding".to_string()))?
        );

        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_eq(sig_v1.as_bytes(), expected.as_bytes()) {
            error!("Webhook signature verification failed");
            return Err(BillingError::Webhook(
                "Signature verification failed".to_string(),
            ));
        }

        // Check timestamp freshness (within 5 minutes)
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::Webhook("Invalid timestamp format".to_string()))?;
        let now = Utc::now().timestamp();
        if (now - ts).abs() > 300 {
            warn!(timestamp = ts, now = now, "Webhook timestamp too old");
            return Err(BillingError::Webhook("Timestamp too old".to_string()));
        }

        Ok(())
    }

    /// Parse event data based on type
    fn parse_event_data(
        event_type: &WebhookEventType,
        object: serde_json::Value,
    ) -> Result<WebhookEventData, BillingError> {
        match event_type {
            WebhookEventType::CheckoutSessionCompleted => {
                let session: RawCheckoutSession = serde_json::from_value(object)
                    .map_err(|e| BillingError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::CheckoutSession(CheckoutSessionData {
                    session_id: session.id,
                    customer_id: session.customer.unwrap_or_default(),
                    subscription_id: session.subscription,
                }))
            }
            WebhookEventType::SubscriptionCreated
            | WebhookEventType::SubscriptionUpdated
            | WebhookEventType::SubscriptionDeleted => {
                let sub: StripeSubscription = serde_json::from_value(object)
                    .map_err(|e| BillingError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::Subscription(SubscriptionEventData {
                    gateway_subscription_id: sub.id,
                    customer_id: sub.customer,
                    status: sub.status,
                    period_start: timestamp_to_utc(sub.current_period_start)?,
                    period_end: timestamp_to_utc(sub.current_period_end)?,
                    cancel_at_period_end: sub.cancel_at_period_end,
                }))
            }
            WebhookEventType::InvoicePaymentSucceeded
            | WebhookEventType::InvoicePaymentFailed => {
                let inv: StripeInvoice = serde_json::from_value(object)
                    .map_err(|e| BillingError::Webhook(e.to_string()))?;
                Ok(WebhookEventData::Invoice(InvoiceEventData {
                    invoice_id: inv.id,
                    customer_id: inv.customer,
                    gateway_subscription_id: inv.subscription,
                    status: inv.status.unwrap_or_default(),
                    amount_minor_units: inv.amount_paid,
                    currency: inv.currency,
                    period_start: timestamp_to_utc(inv.period_start)?,
                    period_end: timestamp_to_utc(inv.period_end)?,
                }))
            }
            WebhookEventType::Unknown(_) => {
                info!("Received unknown webhook event type");
                Ok(WebhookEventData::Raw(object))
            }
        }
    }
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Raw Stripe event for parsing
#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: String,
    customer: Option<String>,
    subscription: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(payload: &[u8], secret: &str, ts: i64) -> String {
        let signed_payload = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap());
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        format!("t={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
    }

    fn subscription_payload(event_type: &str) -> Vec<u8> {
        let now = Utc::now().timestamp();
        serde_json::to_vec(&serde_json::json!({
            "id": "evt_test_1",
            "type": event_type,
            "created": now,
            "data": {
                "object": {
                    "id": "sub_test_1",
                    "customer": "cus_test_1",
                    "status": "active",
                    "current_period_start": now,
                    "current_period_end": now + 30 * 24 * 60 * 60,
                    "cancel_at_period_end": true
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn valid_signature_parses() {
        let handler = WebhookHandler::new("whsec_test");
        let payload = subscription_payload("customer.subscription.deleted");
        let sig = signed(&payload, "whsec_test", Utc::now().timestamp());

        let event = handler.verify_and_parse(&payload, &sig).unwrap();
        assert_eq!(event.event_type, WebhookEventType::SubscriptionDeleted);
        match event.data {
            WebhookEventData::Subscription(data) => {
                assert_eq!(data.gateway_subscription_id, "sub_test_1");
                assert!(data.cancel_at_period_end);
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let handler = WebhookHandler::new("whsec_test");
        let payload = subscription_payload("customer.subscription.updated");
        let sig = signed(&payload, "whsec_other", Utc::now().timestamp());

        assert!(matches!(
            handler.verify_and_parse(&payload, &sig),
            Err(BillingError::Webhook(_))
        ));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let handler = WebhookHandler::new("whsec_test");
        let payload = subscription_payload("customer.subscription.updated");
        let sig = signed(&payload, "whsec_test", Utc::now().timestamp() - 600);

        assert!(matches!(
            handler.verify_and_parse(&payload, &sig),
            Err(BillingError::Webhook(_))
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let handler = WebhookHandler::new("whsec_test");
        let payload = subscription_payload("customer.subscription.updated");
        let sig = signed(&payload, "whsec_test", Utc::now().timestamp());

        let mut tampered = payload.clone();
        let pos = tampered.len() - 10;
        tampered[pos] ^= 1;

        assert!(handler.verify_and_parse(&tampered, &sig).is_err());
    }

    #[test]
    fn payment_succeeded_aliases_map_to_one_type() {
        assert_eq!(
            WebhookEventType::from("invoice.payment_succeeded"),
            WebhookEventType::InvoicePaymentSucceeded
        );
        assert_eq!(
            WebhookEventType::from("invoice.paid"),
            WebhookEventType::InvoicePaymentSucceeded
        );
    }

    #[test]
    fn unknown_event_type_is_preserved_raw() {
        let handler = WebhookHandler::new("whsec_test");
        let now = Utc::now().timestamp();
        let payload = serde_json::to_vec(&serde_json::json!({
            "id": "evt_test_2",
            "type": "charge.refunded",
            "created": now,
            "data": { "object": { "id": "ch_1" } }
        }))
        .unwrap();
        let sig = signed(&payload, "whsec_test", now);

        let event = handler.verify_and_parse(&payload, &sig).unwrap();
        assert_eq!(
            event.event_type,
            WebhookEventType::Unknown("charge.refunded".to_string())
        );
        assert!(matches!(event.data, WebhookEventData::Raw(_)));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
        assert!(!constant_time_eq(b"abc123", b"abc124"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
