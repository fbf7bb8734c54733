//! Billing configuration

use std::collections::HashMap;

use faktura_types::PlanId;

use crate::error::BillingError;

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook secret
    pub webhook_secret: String,
    /// Map of plans to Stripe price IDs
    pub price_ids: HashMap<PlanId, String>,
    /// Default success URL for checkout
    pub default_success_url: String,
    /// Default cancel URL for checkout
    pub default_cancel_url: String,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(
        stripe_secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            stripe_secret_key: stripe_secret_key.into(),
            webhook_secret: webhook_secret.into(),
            price_ids: HashMap::new(),
            default_success_url: "https://app.example.com/billing/success".to_string(),
            default_cancel_url: "https://app.example.com/billing/cancel".to_string(),
        }
    }

    /// Set price ID for a plan
    pub fn with_price(mut self, plan: PlanId, price_id: impl Into<String>) -> Self {
        self.price_ids.insert(plan, price_id.into());
        self
    }

    /// Set default URLs
    pub fn with_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.default_success_url = success_url.into();
        self.default_cancel_url = cancel_url.into();
        self
    }

    /// Get the price ID for a plan.
    ///
    /// A missing mapping is a configuration error and surfaces loudly;
    /// mixed-up monthly/yearly price ids between environments is exactly the
    /// failure this contract catches.
    pub fn price_id(&self, plan: PlanId) -> Result<&str, BillingError> {
        self.price_ids
            .get(&plan)
            .map(String::as_str)
            .ok_or(BillingError::MissingPriceId(plan))
    }
}
