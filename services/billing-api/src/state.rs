//! Application state for the Billing API service.

use std::sync::Arc;

use faktura_billing_core::{StripeGateway, SubscriptionLifecycle};
use faktura_db::pg::PgSubscriptionRepository;
use faktura_db::{DbPool, Repositories};

use crate::config::Config;

/// The lifecycle as wired in production
pub type Lifecycle = SubscriptionLifecycle<PgSubscriptionRepository, StripeGateway>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Subscription lifecycle (checkout, cancellation, sweep, webhooks)
    pub lifecycle: Arc<Lifecycle>,
    /// Database repositories (user lookups for customer linkage)
    pub repos: Repositories,
    /// Database pool (readiness probe)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(lifecycle: Lifecycle, repos: Repositories, pool: DbPool, config: Config) -> Self {
        Self {
            lifecycle: Arc::new(lifecycle),
            repos,
            pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
