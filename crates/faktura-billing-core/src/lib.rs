//! Faktura Billing Core - Billing business logic
//!
//! Core billing functionality: the payment gateway abstraction with a Stripe
//! implementation, webhook verification, and the subscription lifecycle state
//! machine that gates watermark removal.
//!
//! # Example
//!
//! ```rust,ignore
//! use faktura_billing_core::{BillingConfig, StripeGateway, SubscriptionLifecycle, WebhookHandler};
//! use faktura_types::PlanId;
//!
//! let config = BillingConfig::new("sk_test_...", "whsec_...")
//!     .with_price(PlanId::Monthly, "price_...");
//!
//! let gateway = StripeGateway::new(config.clone());
//! let webhooks = WebhookHandler::new(&config.webhook_secret);
//! let lifecycle = SubscriptionLifecycle::new(repos.subscriptions, gateway, webhooks);
//!
//! let entitlements = lifecycle.entitlements(&user_id, Utc::now()).await?;
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod stripe;
pub mod webhook;

pub use config::BillingConfig;
pub use error::BillingError;
pub use lifecycle::{CheckoutOutcome, SubscriptionLifecycle, WebhookDisposition};
pub use provider::{
    CheckoutSession, GatewayCancellation, GatewayCustomer, GatewaySubscription, PaymentGateway,
    PaymentIntent,
};
pub use stripe::StripeGateway;
pub use webhook::{WebhookEvent, WebhookEventData, WebhookEventType, WebhookHandler};

// Re-export the entitlement policy so billing consumers get the one shared
// implementation without a direct types dependency
pub use faktura_types::{display_as_pro, grants_watermark_removal, is_active, Entitlements};
