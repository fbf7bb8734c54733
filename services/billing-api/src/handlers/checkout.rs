//! Checkout and purchase handlers
//!
//! Three flows: a hosted checkout session, a direct subscription with a
//! client-side payment confirmation, and a one-time payment intent for the
//! single purchase. A local subscription record only exists once the
//! completion endpoint confirms the payment.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

use faktura_billing_core::{CheckoutOutcome, PaymentGateway};
use faktura_db::{CreateUser, UserRepository};
use faktura_types::{Plan, PlanId, UserId};

use crate::error::{ApiError, ApiResult};
use crate::handlers::subscription::SubscriptionResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub user_id: String,
    pub plan: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub user_id: String,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub gateway_subscription_id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntentRequest {
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount_minor_units: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteCheckoutRequest {
    pub user_id: String,
    pub plan: String,
    pub gateway_subscription_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompleteCheckoutResponse {
    /// A recurring plan produced a subscription record
    Subscription(SubscriptionResponse),
    /// A single purchase: the caller may render one watermark-free document
    OneShot { suppress_watermark: bool },
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|_| ApiError::BadRequest("Invalid user_id".to_string()))
}

fn parse_plan(raw: &str) -> Result<PlanId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid plan: {raw}")))
}

/// Look up the user's gateway customer, creating one on first purchase
async fn ensure_customer(state: &AppState, user_id: &UserId) -> ApiResult<String> {
    let user = state
        .repos
        .users
        .find_by_id(user_id.0)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if let Some(customer_id) = user.gateway_customer_id {
        return Ok(customer_id);
    }

    let customer = state
        .lifecycle
        .gateway()
        .create_customer(&user.email, Some(&user.name))
        .await?;
    state
        .repos
        .users
        .update_gateway_customer_id(user.id, &customer.id)
        .await?;

    Ok(customer.id)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/billing/checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    let start = Instant::now();
    let user_id = parse_user_id(&req.user_id)?;
    let plan = parse_plan(&req.plan)?;

    if plan == PlanId::Free {
        return Err(ApiError::BadRequest("The free plan has no checkout".to_string()));
    }

    let customer_id = ensure_customer(&state, &user_id).await?;
    let success_url = req
        .success_url
        .as_deref()
        .unwrap_or(&state.config.billing.default_success_url);
    let cancel_url = req
        .cancel_url
        .as_deref()
        .unwrap_or(&state.config.billing.default_cancel_url);

    let session = state
        .lifecycle
        .gateway()
        .create_checkout_session(&customer_id, plan, success_url, cancel_url)
        .await?;

    metrics::counter!("billing_checkouts_created_total").increment(1);
    metrics::histogram!("billing_operation_duration_seconds", "operation" => "create_checkout")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(user_id = %user_id, plan = %plan, "Checkout session created");

    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}

/// POST /api/v1/billing/subscribe
///
/// Creates the gateway subscription and returns the client secret for the
/// first charge. No local record yet; that happens on completion.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<Json<SubscribeResponse>> {
    let user_id = parse_user_id(&req.user_id)?;
    let plan = parse_plan(&req.plan)?;

    if !plan.is_recurring() {
        return Err(ApiError::BadRequest(format!(
            "Plan {plan} is not a recurring subscription"
        )));
    }

    let customer_id = ensure_customer(&state, &user_id).await?;
    let sub = state
        .lifecycle
        .gateway()
        .create_subscription(&customer_id, plan)
        .await?;

    tracing::info!(user_id = %user_id, plan = %plan, "Gateway subscription created");

    Ok(Json(SubscribeResponse {
        gateway_subscription_id: sub.gateway_subscription_id,
        client_secret: sub.client_secret,
    }))
}

/// POST /api/v1/billing/payment-intent
///
/// One-time payment for the single purchase; amount comes from the catalog,
/// never from the client.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(req): Json<PaymentIntentRequest>,
) -> ApiResult<Json<PaymentIntentResponse>> {
    let plan = parse_plan(&req.plan)?;
    let catalog = Plan::get(plan);

    if catalog.price_minor_units == 0 {
        return Err(ApiError::BadRequest(format!("Plan {plan} is free")));
    }

    let intent = state
        .lifecycle
        .gateway()
        .create_payment_intent(catalog.price_minor_units, &catalog.currency.to_lowercase())
        .await?;

    Ok(Json(PaymentIntentResponse {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        amount_minor_units: catalog.price_minor_units,
        currency: catalog.currency.to_string(),
    }))
}

/// POST /api/v1/billing/checkout/complete
///
/// Called once the gateway confirms payment. Recurring plans write the
/// subscription record here, with the paid window fixed at this instant.
pub async fn complete_checkout(
    State(state): State<AppState>,
    Json(req): Json<CompleteCheckoutRequest>,
) -> ApiResult<Json<CompleteCheckoutResponse>> {
    let user_id = parse_user_id(&req.user_id)?;
    let plan = parse_plan(&req.plan)?;

    // Require the user to exist before recording anything against them
    state
        .repos
        .users
        .find_by_id(user_id.0)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let now = Utc::now();
    let outcome = state
        .lifecycle
        .complete_checkout(&user_id, plan, req.gateway_subscription_id, now)
        .await?;

    match outcome {
        CheckoutOutcome::Subscription(sub) => Ok(Json(CompleteCheckoutResponse::Subscription(
            sub.into(),
        ))),
        CheckoutOutcome::OneShot => Ok(Json(CompleteCheckoutResponse::OneShot {
            suppress_watermark: true,
        })),
    }
}

/// POST /api/v1/billing/users
///
/// Minimal user registration so purchases have an owner to attach to.
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Json<CreateUserResponse>> {
    if req.email.is_empty() || !req.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email".to_string()));
    }

    let user = state
        .repos
        .users
        .create(CreateUser {
            id: Uuid::new_v4(),
            email: req.email,
            name: req.name,
            company: req.company,
        })
        .await?;

    Ok(Json(CreateUserResponse {
        user_id: user.id.to_string(),
        email: user.email,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub company: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub email: String,
}
