//! Subscription and entitlement handlers

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use faktura_types::{Entitlements, Subscription, UserId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub status: String,
    pub current_period_start: String,
    pub current_period_end: String,
    pub cancel_at_period_end: bool,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            user_id: sub.user_id.to_string(),
            plan: sub.plan.to_string(),
            status: sub.status.to_string(),
            current_period_start: sub.current_period_start.to_rfc3339(),
            current_period_end: sub.current_period_end.to_rfc3339(),
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub user_id: String,
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse(raw).map_err(|_| ApiError::BadRequest("Invalid user_id".to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/billing/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let user_id = parse_user_id(&query.user_id)?;

    let sub = state
        .lifecycle
        .current_subscription(&user_id)
        .await?
        .ok_or(ApiError::SubscriptionNotFound)?;

    Ok(Json(sub.into()))
}

/// GET /api/v1/billing/entitlements
///
/// The policy booleans for downstream consumers; the invoice renderer reads
/// `suppress_watermark` and nothing else.
pub async fn get_entitlements(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Entitlements>> {
    let user_id = parse_user_id(&query.user_id)?;

    // One clock read covers the whole evaluation
    let now = Utc::now();
    let entitlements = state.lifecycle.entitlements(&user_id, now).await?;

    Ok(Json(entitlements))
}

/// POST /api/v1/billing/cancel
///
/// Asks the gateway to stop renewal, then records the flag locally. The
/// subscription stays active until its period end passes.
pub async fn cancel_subscription(
    State(state): State<AppState>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();
    let user_id = parse_user_id(&req.user_id)?;

    let now = Utc::now();
    let sub = state.lifecycle.request_cancellation(&user_id, now).await?;

    metrics::counter!("billing_subscriptions_canceled_total").increment(1);
    metrics::histogram!("billing_operation_duration_seconds", "operation" => "cancel")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(user_id = %user_id, "Cancellation requested");

    Ok(Json(sub.into()))
}
