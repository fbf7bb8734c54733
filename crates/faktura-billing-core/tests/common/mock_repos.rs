//! In-memory subscription repository for testing
//!
//! Backed by a DashMap, with a write counter so tests can assert that
//! idempotent operations do not produce second writes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use faktura_db::{CreateSubscription, DbResult, SubscriptionRepository, SubscriptionRow};

/// In-memory subscription repository
#[derive(Default, Clone)]
pub struct MockSubscriptionRepository {
    rows: Arc<DashMap<Uuid, SubscriptionRow>>,
    /// Insertion order, used to break created_at ties like row order does
    seq: Arc<DashMap<Uuid, u64>>,
    next_seq: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
}

impl MockSubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating writes that actually changed a row
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Insert a row directly, bypassing the write counter
    pub fn insert_row(&self, row: SubscriptionRow) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.seq.insert(row.id, seq);
        self.rows.insert(row.id, row);
    }

    /// Fetch a row directly for assertions
    pub fn get(&self, id: Uuid) -> Option<SubscriptionRow> {
        self.rows.get(&id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.rows.get(&id).map(|r| r.value().clone()))
    }

    async fn find_latest_by_user(&self, user_id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        let latest = self
            .rows
            .iter()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| {
                let seq = self.seq.get(&r.id).map(|s| *s.value()).unwrap_or(0);
                (r.created_at, seq)
            })
            .map(|r| r.value().clone());
        Ok(latest)
    }

    async fn find_by_gateway_id(&self, gateway_id: &str) -> DbResult<Option<SubscriptionRow>> {
        Ok(self
            .rows
            .iter()
            .find(|r| r.gateway_subscription_id.as_deref() == Some(gateway_id))
            .map(|r| r.value().clone()))
    }

    async fn find_expired_active(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| {
                r.status == "active"
                    && r.cancel_at_period_end
                    && r.current_period_end.is_some_and(|end| end < now)
            })
            .map(|r| r.value().clone())
            .collect())
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let now = Utc::now();
        let row = SubscriptionRow {
            id: sub.id,
            user_id: sub.user_id,
            plan: sub.plan,
            status: "active".to_string(),
            gateway_subscription_id: sub.gateway_subscription_id,
            current_period_start: sub.current_period_start,
            current_period_end: Some(sub.current_period_end),
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert_row(row.clone());
        Ok(row)
    }

    async fn set_cancel_at_period_end(&self, id: Uuid, cancel: bool) -> DbResult<()> {
        if let Some(mut row) = self.rows.get_mut(&id) {
            row.cancel_at_period_end = cancel;
            row.updated_at = Utc::now();
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn expire_if_due(&self, id: Uuid, now: DateTime<Utc>) -> DbResult<bool> {
        if let Some(mut row) = self.rows.get_mut(&id) {
            let due = row.status == "active"
                && row.current_period_end.is_some_and(|end| end < now);
            if due {
                row.status = "expired".to_string();
                row.updated_at = Utc::now();
                self.writes.fetch_add(1, Ordering::SeqCst);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_past_due_if_active(&self, gateway_id: &str) -> DbResult<bool> {
        for mut row in self.rows.iter_mut() {
            if row.gateway_subscription_id.as_deref() == Some(gateway_id)
                && row.status == "active"
            {
                row.status = "past_due".to_string();
                row.updated_at = Utc::now();
                self.writes.fetch_add(1, Ordering::SeqCst);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn reactivate_if_past_due(&self, gateway_id: &str) -> DbResult<bool> {
        for mut row in self.rows.iter_mut() {
            if row.gateway_subscription_id.as_deref() == Some(gateway_id)
                && row.status == "past_due"
            {
                row.status = "active".to_string();
                row.updated_at = Utc::now();
                self.writes.fetch_add(1, Ordering::SeqCst);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn advance_period(
        &self,
        gateway_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DbResult<bool> {
        for mut row in self.rows.iter_mut() {
            if row.gateway_subscription_id.as_deref() == Some(gateway_id)
                && matches!(row.status.as_str(), "active" | "past_due")
                && row.current_period_end.is_some_and(|end| end < period_end)
            {
                row.current_period_start = period_start;
                row.current_period_end = Some(period_end);
                row.updated_at = Utc::now();
                self.writes.fetch_add(1, Ordering::SeqCst);
                return Ok(true);
            }
        }
        Ok(false)
    }
}
