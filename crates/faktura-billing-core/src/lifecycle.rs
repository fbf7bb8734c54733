//! Subscription lifecycle
//!
//! The state machine governing subscription records: checkout completion,
//! user-initiated cancellation, the periodic expiry sweep, and gateway
//! webhook events. The store is the single source of truth; any copy held by
//! a caller is a cache and must be re-fetched after a mutating call.
//!
//! Every operation takes `now` from the caller so one consistently fetched
//! instant covers the whole evaluation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use faktura_db::{CreateSubscription, SubscriptionRepository, SubscriptionRow};
use faktura_types::{Entitlements, Plan, PlanId, Subscription, SubscriptionId, UserId};

use crate::error::BillingError;
use crate::provider::PaymentGateway;
use crate::webhook::{WebhookEvent, WebhookEventData, WebhookEventType, WebhookHandler};

/// Result of a completed checkout
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// A recurring plan created a subscription record
    Subscription(Subscription),
    /// A single purchase: one watermark-free document, consumed by the
    /// caller, no record created
    OneShot,
}

/// What a webhook event did to local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// A transition was applied
    Applied,
    /// The event matched a row already in the target state (replay or lost
    /// race); nothing was written
    NoOp,
    /// The event does not concern any local record
    Ignored,
}

/// Subscription lifecycle component
pub struct SubscriptionLifecycle<R, G> {
    subscriptions: Arc<R>,
    gateway: Arc<G>,
    webhooks: WebhookHandler,
}

impl<R, G> SubscriptionLifecycle<R, G>
where
    R: SubscriptionRepository,
    G: PaymentGateway,
{
    /// Create a new lifecycle component
    pub fn new(subscriptions: Arc<R>, gateway: Arc<G>, webhooks: WebhookHandler) -> Self {
        Self {
            subscriptions,
            gateway,
            webhooks,
        }
    }

    /// The gateway behind this lifecycle
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Fetch the user's current subscription: the newest row, decoded.
    ///
    /// A row that fails decoding is logged and treated as absent, so the
    /// caller falls back to the free tier (fail closed) instead of crashing
    /// or guessing.
    pub async fn current_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, BillingError> {
        let row = self.subscriptions.find_latest_by_user(user_id.0).await?;
        Ok(decode_fail_closed(row))
    }

    /// Evaluate the entitlement policy for a user at a single instant.
    pub async fn entitlements(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Entitlements, BillingError> {
        let sub = self.current_subscription(user_id).await?;
        Ok(Entitlements::evaluate(sub.as_ref(), now))
    }

    /// Transition 1: checkout completed, confirmed by the gateway.
    ///
    /// Recurring plans create a new record with the paid window written once,
    /// here, and trusted afterwards. A single purchase never enters the state
    /// machine. The free plan is not purchasable; reaching this point with it
    /// is a configuration error.
    #[instrument(skip(self))]
    pub async fn complete_checkout(
        &self,
        user_id: &UserId,
        plan: PlanId,
        gateway_subscription_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, BillingError> {
        let catalog = Plan::get(plan);

        let Some(period) = catalog.billing_interval.period() else {
            if plan == PlanId::Single {
                info!(user_id = %user_id, "Single purchase confirmed, no record created");
                return Ok(CheckoutOutcome::OneShot);
            }
            return Err(BillingError::NotPurchasable(plan));
        };

        let row = self
            .subscriptions
            .create(CreateSubscription {
                id: SubscriptionId::new().0,
                user_id: user_id.0,
                plan: plan.to_string(),
                gateway_subscription_id,
                current_period_start: now,
                current_period_end: now + period,
            })
            .await?;

        let sub = Subscription::try_from(row)
            .map_err(|e| BillingError::Internal(format!("created row does not decode: {e}")))?;

        info!(
            user_id = %user_id,
            plan = %plan,
            period_end = %sub.current_period_end,
            "Subscription activated from checkout"
        );

        Ok(CheckoutOutcome::Subscription(sub))
    }

    /// Transition 2: the user requests non-renewal.
    ///
    /// Gateway first, store second: the local flag is only written after the
    /// gateway acknowledges, so a gateway failure leaves the record exactly
    /// as it was. The returned subscription is re-fetched from the store.
    #[instrument(skip(self))]
    pub async fn request_cancellation(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Subscription, BillingError> {
        let sub = self
            .current_subscription(user_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;

        if sub.plan == PlanId::Free {
            return Err(BillingError::NotCancelable("free plan has no renewal"));
        }
        if now > sub.current_period_end {
            return Err(BillingError::NotCancelable("paid period already over"));
        }

        if sub.cancel_at_period_end {
            debug!(user_id = %user_id, "Cancellation already requested");
            return Ok(sub);
        }

        let gateway_id = sub
            .gateway_subscription_id
            .as_deref()
            .ok_or(BillingError::MissingGatewayReference)?;

        let ack = self.gateway.cancel_at_period_end(gateway_id).await?;
        debug!(
            gateway_status = %ack.status,
            cancel_at_period_end = ack.cancel_at_period_end,
            "Gateway acknowledged cancellation"
        );

        // Gateway succeeded; a store failure from here on is a
        // reconciliation gap, not a rollback
        self.subscriptions
            .set_cancel_at_period_end(sub.id.0, true)
            .await
            .map_err(|e| {
                warn!(error = %e, "Local write failed after gateway cancellation");
                BillingError::Reconciliation(e.to_string())
            })?;

        info!(user_id = %user_id, subscription_id = %sub.id, "Cancellation recorded");

        self.current_subscription(user_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)
    }

    /// Transition 3: the expiry sweep.
    ///
    /// Idempotent and safe to run on every start and on a timer. Each row is
    /// expired through a conditional update, so a row that raced into another
    /// state since the listing is skipped, and re-running over already
    /// expired rows writes nothing.
    #[instrument(skip(self))]
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> Result<u64, BillingError> {
        let due = self.subscriptions.find_expired_active(now).await?;
        let mut transitioned = 0u64;

        for row in due {
            let id = row.id;
            if self.subscriptions.expire_if_due(id, now).await? {
                transitioned += 1;
                debug!(subscription_id = %id, "Subscription expired");
            }
        }

        if transitioned > 0 {
            info!(count = transitioned, "Expiry sweep transitioned subscriptions");
        }

        Ok(transitioned)
    }

    /// Transition 4: verify and apply a gateway webhook.
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookDisposition, BillingError> {
        let event = self.webhooks.verify_and_parse(payload, signature)?;
        self.apply_webhook_event(&event, now).await
    }

    /// Apply an already-verified webhook event.
    ///
    /// Transitions are state-conditional updates, so redelivery of the same
    /// event finds the row already in the target state and becomes a
    /// [`WebhookDisposition::NoOp`]; no event-id ledger is needed.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn apply_webhook_event(
        &self,
        event: &WebhookEvent,
        now: DateTime<Utc>,
    ) -> Result<WebhookDisposition, BillingError> {
        match (&event.event_type, &event.data) {
            (WebhookEventType::SubscriptionDeleted, WebhookEventData::Subscription(data)) => {
                let Some(row) = self
                    .subscriptions
                    .find_by_gateway_id(&data.gateway_subscription_id)
                    .await?
                else {
                    warn!(gateway_id = %data.gateway_subscription_id, "Deleted event for unknown subscription");
                    return Ok(WebhookDisposition::Ignored);
                };

                if self.subscriptions.expire_if_due(row.id, now).await? {
                    info!(subscription_id = %row.id, "Subscription expired via gateway deletion");
                    Ok(WebhookDisposition::Applied)
                } else {
                    Ok(WebhookDisposition::NoOp)
                }
            }

            (WebhookEventType::SubscriptionUpdated, WebhookEventData::Subscription(data)) => {
                let Some(row) = self
                    .subscriptions
                    .find_by_gateway_id(&data.gateway_subscription_id)
                    .await?
                else {
                    return Ok(WebhookDisposition::Ignored);
                };

                // The gateway's state wins over stale local state: sync the
                // cancel flag and the paid window it reports
                let mut applied = false;

                if data.cancel_at_period_end && !row.cancel_at_period_end {
                    self.subscriptions
                        .set_cancel_at_period_end(row.id, true)
                        .await?;
                    info!(subscription_id = %row.id, "Cancellation flag synced from gateway");
                    applied = true;
                }

                if self
                    .subscriptions
                    .advance_period(
                        &data.gateway_subscription_id,
                        data.period_start,
                        data.period_end,
                    )
                    .await?
                {
                    info!(
                        subscription_id = %row.id,
                        period_end = %data.period_end,
                        "Paid window advanced from gateway"
                    );
                    applied = true;
                }

                if applied {
                    Ok(WebhookDisposition::Applied)
                } else {
                    Ok(WebhookDisposition::NoOp)
                }
            }

            (WebhookEventType::InvoicePaymentFailed, WebhookEventData::Invoice(data)) => {
                let Some(gateway_id) = data.gateway_subscription_id.as_deref() else {
                    return Ok(WebhookDisposition::Ignored);
                };

                if self.subscriptions.mark_past_due_if_active(gateway_id).await? {
                    warn!(gateway_id = %gateway_id, "Renewal charge failed, subscription past due");
                    Ok(WebhookDisposition::Applied)
                } else {
                    Ok(WebhookDisposition::NoOp)
                }
            }

            (WebhookEventType::InvoicePaymentSucceeded, WebhookEventData::Invoice(data)) => {
                let Some(gateway_id) = data.gateway_subscription_id.as_deref() else {
                    return Ok(WebhookDisposition::Ignored);
                };

                let reactivated = self.subscriptions.reactivate_if_past_due(gateway_id).await?;
                if reactivated {
                    info!(gateway_id = %gateway_id, "Payment recovered, subscription active again");
                }

                // A successful renewal charge buys the next window; without
                // this write the subscriber loses access when the old window
                // runs out
                let renewed = self
                    .subscriptions
                    .advance_period(gateway_id, data.period_start, data.period_end)
                    .await?;
                if renewed {
                    info!(
                        gateway_id = %gateway_id,
                        period_end = %data.period_end,
                        "Paid window advanced after renewal charge"
                    );
                }

                if reactivated || renewed {
                    Ok(WebhookDisposition::Applied)
                } else {
                    Ok(WebhookDisposition::NoOp)
                }
            }

            // Creation is driven by the checkout completion flow, which
            // knows the purchasing user; the webhook copy carries no user
            // mapping and is informational here
            (WebhookEventType::SubscriptionCreated, _)
            | (WebhookEventType::CheckoutSessionCompleted, _) => {
                debug!(event_type = ?event.event_type, "Informational event, no transition");
                Ok(WebhookDisposition::Ignored)
            }

            (WebhookEventType::Unknown(kind), _) => {
                debug!(event_type = %kind, "Unknown event type ignored");
                Ok(WebhookDisposition::Ignored)
            }

            // Type/data mismatch from a malformed payload
            _ => Err(BillingError::Webhook(format!(
                "event {} carries mismatched data",
                event.id
            ))),
        }
    }
}

/// Decode a row, treating malformed data as absence (free tier).
fn decode_fail_closed(row: Option<SubscriptionRow>) -> Option<Subscription> {
    let row = row?;
    match Subscription::try_from(row) {
        Ok(sub) => Some(sub),
        Err(e) => {
            warn!(error = %e, "Undecodable subscription row, treating as free tier");
            None
        }
    }
}

impl<R, G> Clone for SubscriptionLifecycle<R, G> {
    fn clone(&self) -> Self {
        Self {
            subscriptions: Arc::clone(&self.subscriptions),
            gateway: Arc::clone(&self.gateway),
            webhooks: self.webhooks.clone(),
        }
    }
}

impl<R, G> std::fmt::Debug for SubscriptionLifecycle<R, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionLifecycle").finish()
    }
}
