//! Error types for the Billing API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use faktura_billing_core::BillingError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Database error")]
    Database(#[from] faktura_db::DbError),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::SubscriptionNotFound | Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Billing(e) => match e {
                BillingError::SubscriptionNotFound => StatusCode::NOT_FOUND,
                BillingError::UnknownPlan(_) | BillingError::NotPurchasable(_) => {
                    StatusCode::BAD_REQUEST
                }
                BillingError::NotCancelable(_) | BillingError::MissingGatewayReference => {
                    StatusCode::CONFLICT
                }
                BillingError::Gateway(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Billing(e) => match e {
                BillingError::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
                BillingError::UnknownPlan(_) => "UNKNOWN_PLAN",
                BillingError::NotPurchasable(_) => "PLAN_NOT_PURCHASABLE",
                BillingError::NotCancelable(_) => "SUBSCRIPTION_NOT_CANCELABLE",
                BillingError::MissingGatewayReference => "MISSING_GATEWAY_REFERENCE",
                BillingError::Gateway(_) => "GATEWAY_ERROR",
                BillingError::MissingPriceId(_) => "PRICE_NOT_CONFIGURED",
                _ => "INTERNAL_ERROR",
            },
            Self::Internal(_) | Self::Database(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Configuration errors must be loud: they mean a wrong price or plan
        // mapping made it into an environment
        match &self {
            Self::Billing(e) if e.is_configuration_error() => {
                tracing::error!(error = ?self, "Billing configuration error");
            }
            _ if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = ?self, "Internal API error");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
