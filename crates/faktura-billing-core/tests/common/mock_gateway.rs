//! Scriptable payment gateway for testing

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use faktura_billing_core::{
    BillingError, CheckoutSession, GatewayCancellation, GatewayCustomer, GatewaySubscription,
    PaymentGateway, PaymentIntent,
};
use faktura_types::PlanId;

/// Payment gateway whose failure behavior tests can toggle
#[derive(Default, Clone)]
pub struct MockGateway {
    fail_next: Arc<AtomicBool>,
    cancel_calls: Arc<AtomicU64>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with a gateway error
    pub fn fail(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn cancel_calls(&self) -> u64 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), BillingError> {
        if self.fail_next.load(Ordering::SeqCst) {
            return Err(BillingError::Gateway("simulated gateway outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_customer(
        &self,
        email: &str,
        _name: Option<&str>,
    ) -> Result<GatewayCustomer, BillingError> {
        self.check()?;
        Ok(GatewayCustomer {
            id: "cus_mock".to_string(),
            email: Some(email.to_string()),
        })
    }

    async fn create_checkout_session(
        &self,
        _customer_id: &str,
        _plan: PlanId,
        _success_url: &str,
        _cancel_url: &str,
    ) -> Result<CheckoutSession, BillingError> {
        self.check()?;
        Ok(CheckoutSession {
            session_id: "cs_mock".to_string(),
            url: "https://checkout.example.com/cs_mock".to_string(),
        })
    }

    async fn create_subscription(
        &self,
        _customer_id: &str,
        _plan: PlanId,
    ) -> Result<GatewaySubscription, BillingError> {
        self.check()?;
        Ok(GatewaySubscription {
            gateway_subscription_id: "sub_mock".to_string(),
            client_secret: Some("pi_secret_mock".to_string()),
            status: "incomplete".to_string(),
        })
    }

    async fn create_payment_intent(
        &self,
        _amount_minor_units: i64,
        _currency: &str,
    ) -> Result<PaymentIntent, BillingError> {
        self.check()?;
        Ok(PaymentIntent {
            id: "pi_mock".to_string(),
            client_secret: Some("pi_secret_mock".to_string()),
        })
    }

    async fn cancel_at_period_end(
        &self,
        _gateway_subscription_id: &str,
    ) -> Result<GatewayCancellation, BillingError> {
        self.check()?;
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayCancellation {
            status: "active".to_string(),
            cancel_at_period_end: true,
            current_period_end: Some(Utc::now() + Duration::days(30)),
        })
    }
}
