//! Stripe webhook handler

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use std::time::Instant;

use faktura_billing_core::{BillingError, WebhookDisposition};

use crate::state::AppState;

/// POST /webhooks/stripe
///
/// Handle Stripe webhook events with signature verification. Redelivered
/// events resolve to no-ops and still return 200 so the gateway stops
/// retrying.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let start = Instant::now();

    // Extract Stripe signature header
    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return StatusCode::BAD_REQUEST;
    };

    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return StatusCode::BAD_REQUEST;
    };

    let now = Utc::now();
    match state.lifecycle.process_webhook(&body, signature, now).await {
        Ok(disposition) => {
            let status_label = match disposition {
                WebhookDisposition::Applied => "applied",
                WebhookDisposition::NoOp => "noop",
                WebhookDisposition::Ignored => "ignored",
            };
            metrics::counter!("billing_webhooks_processed_total", "status" => status_label)
                .increment(1);
            metrics::histogram!(
                "billing_operation_duration_seconds",
                "operation" => "process_webhook"
            )
            .record(start.elapsed().as_secs_f64());

            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(error = ?e, "Webhook processing failed");
            metrics::counter!("billing_webhooks_processed_total", "status" => "error").increment(1);

            // 400 for signature/parsing problems, 500 for our own failures
            match e {
                BillingError::Webhook(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }
}
