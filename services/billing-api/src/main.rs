//! Faktura Billing API
//!
//! Billing microservice gating watermark removal behind paid plans.
//!
//! ## REST Endpoints
//!
//! - `GET /api/v1/billing/subscription` - Get user's subscription
//! - `GET /api/v1/billing/entitlements` - Entitlement booleans for the renderer
//! - `POST /api/v1/billing/checkout` - Create hosted checkout session
//! - `POST /api/v1/billing/subscribe` - Create gateway subscription
//! - `POST /api/v1/billing/payment-intent` - One-time purchase intent
//! - `POST /api/v1/billing/checkout/complete` - Record confirmed purchase
//! - `POST /api/v1/billing/cancel` - Cancel at period end
//! - `POST /api/v1/billing/users` - Register a user
//! - `POST /webhooks/stripe` - Stripe webhook handler
//!
//! ## Background work
//!
//! The expiry sweep runs at startup and on a configurable interval,
//! transitioning canceled subscriptions past their paid period to expired.
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use faktura_billing_core::{StripeGateway, SubscriptionLifecycle, WebhookHandler};
use faktura_db::Repositories;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("billing_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Faktura Billing API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool
    let pool = faktura_db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Create repositories
    let repos = Repositories::new(pool.clone());

    // Wire the lifecycle: store + gateway + webhook verification
    let gateway = StripeGateway::new(config.billing.clone());
    let webhooks = WebhookHandler::new(&config.billing.webhook_secret);
    let lifecycle = SubscriptionLifecycle::new(
        Arc::new(repos.subscriptions.clone()),
        Arc::new(gateway),
        webhooks,
    );

    // Create application state
    let state = AppState::new(lifecycle, repos, pool, config.clone());

    // Periodic expiry sweep; the first tick fires immediately, covering the
    // on-startup sweep
    spawn_expiry_sweep(state.lifecycle.clone(), config.sweep_interval);

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    // Start server
    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    run_http_server(app, http_addr).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 billing routes
    let api_v1 = Router::new()
        .route("/billing/subscription", get(handlers::get_subscription))
        .route("/billing/entitlements", get(handlers::get_entitlements))
        .route("/billing/checkout", post(handlers::create_checkout))
        .route("/billing/subscribe", post(handlers::subscribe))
        .route("/billing/payment-intent", post(handlers::create_payment_intent))
        .route("/billing/checkout/complete", post(handlers::complete_checkout))
        .route("/billing/cancel", post(handlers::cancel_subscription))
        .route("/billing/users", post(handlers::create_user));

    // Webhook route (separate - uses raw body, no JSON parsing)
    let webhook_routes = Router::new().route("/webhooks/stripe", post(handlers::stripe_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .nest("/api/v1", api_v1)
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}

/// Run the expiry sweep on an interval until shutdown.
fn spawn_expiry_sweep(lifecycle: Arc<state::Lifecycle>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match lifecycle.run_expiry_sweep(Utc::now()).await {
                Ok(count) => {
                    metrics::counter!("billing_sweep_expired_total").increment(count);
                    if count > 0 {
                        tracing::info!(count, "Expiry sweep completed");
                    }
                }
                Err(e) => {
                    // Entitlement reads still fail closed against the stale
                    // rows; the next tick retries
                    tracing::error!(error = ?e, "Expiry sweep failed");
                }
            }
        }
    });
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Latency buckets for billing operations; most complete in <100ms
    let billing_latency_buckets = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 2.5];

    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            billing_latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("billing_operation_duration_seconds".to_string()),
            billing_latency_buckets,
        )?;

    let handle = builder.install_recorder()?;

    metrics::describe_counter!(
        "billing_checkouts_created_total",
        "Total checkout sessions created"
    );
    metrics::describe_counter!(
        "billing_subscriptions_canceled_total",
        "Total subscriptions canceled"
    );
    metrics::describe_counter!(
        "billing_webhooks_processed_total",
        "Total webhooks processed by disposition"
    );
    metrics::describe_counter!(
        "billing_sweep_expired_total",
        "Total subscriptions expired by the sweep"
    );
    metrics::describe_histogram!(
        "billing_operation_duration_seconds",
        "Billing operation latency in seconds by operation type"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
