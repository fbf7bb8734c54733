//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::SubscriptionRow;
use crate::repo::{CreateSubscription, SubscriptionRepository};

const SELECT_COLUMNS: &str = "id, user_id, plan, status, gateway_subscription_id, \
     current_period_start, current_period_end, cancel_at_period_end, \
     created_at, updated_at";

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_latest_by_user(&self, user_id: Uuid) -> DbResult<Option<SubscriptionRow>> {
        // Newest first; ctid breaks created_at ties by insertion order
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM subscriptions
             WHERE user_id = $1
             ORDER BY created_at DESC, ctid DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_by_gateway_id(&self, gateway_id: &str) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE gateway_subscription_id = $1"
        ))
        .bind(gateway_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_expired_active(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SELECT_COLUMNS}
             FROM subscriptions
             WHERE status = 'active'
               AND cancel_at_period_end
               AND current_period_end < $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "INSERT INTO subscriptions (id, user_id, plan, status, gateway_subscription_id,
                                        current_period_start, current_period_end)
             VALUES ($1, $2, $3, 'active', $4, $5, $6)
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(sub.id)
        .bind(sub.user_id)
        .bind(&sub.plan)
        .bind(&sub.gateway_subscription_id)
        .bind(sub.current_period_start)
        .bind(sub.current_period_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn set_cancel_at_period_end(&self, id: Uuid, cancel: bool) -> DbResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET cancel_at_period_end = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(cancel)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn expire_if_due(&self, id: Uuid, now: DateTime<Utc>) -> DbResult<bool> {
        // Compare-and-set: a concurrent transition wins and this becomes a no-op
        let result = sqlx::query(
            "UPDATE subscriptions
             SET status = 'expired', updated_at = NOW()
             WHERE id = $1
               AND status = 'active'
               AND current_period_end < $2",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_past_due_if_active(&self, gateway_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE subscriptions
             SET status = 'past_due', updated_at = NOW()
             WHERE gateway_subscription_id = $1
               AND status = 'active'",
        )
        .bind(gateway_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reactivate_if_past_due(&self, gateway_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE subscriptions
             SET status = 'active', updated_at = NOW()
             WHERE gateway_subscription_id = $1
               AND status = 'past_due'",
        )
        .bind(gateway_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn advance_period(
        &self,
        gateway_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> DbResult<bool> {
        // Forward-only: a replayed renewal carries the window the row already
        // has and matches zero rows
        let result = sqlx::query(
            "UPDATE subscriptions
             SET current_period_start = $2, current_period_end = $3, updated_at = NOW()
             WHERE gateway_subscription_id = $1
               AND status IN ('active', 'past_due')
               AND current_period_end < $3",
        )
        .bind(gateway_id)
        .bind(period_start)
        .bind(period_end)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
