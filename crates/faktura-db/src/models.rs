//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.
//! Status, plan and period columns are decoded into domain types at the
//! boundary; a row that does not decode is treated as absent for entitlement
//! purposes (fail closed), never patched up at read time.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use faktura_types::{Subscription, SubscriptionId, SubscriptionStatus, UserId};

use crate::error::DbError;

/// User row from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription row from the database
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub gateway_subscription_id: Option<String>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let plan = row
            .plan
            .parse()
            .map_err(|e| DbError::Malformed(format!("subscription {}: {e}", row.id)))?;
        let status = row
            .status
            .parse()
            .map_err(|e| DbError::Malformed(format!("subscription {}: {e}", row.id)))?;
        let current_period_end = row.current_period_end.ok_or_else(|| {
            DbError::Malformed(format!("subscription {}: missing current_period_end", row.id))
        })?;

        Ok(Subscription {
            id: SubscriptionId(row.id),
            user_id: UserId(row.user_id),
            plan,
            status,
            current_period_start: row.current_period_start,
            current_period_end,
            cancel_at_period_end: row.cancel_at_period_end,
            gateway_subscription_id: row.gateway_subscription_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faktura_types::PlanId;

    fn row() -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: "monthly".to_string(),
            status: "active".to_string(),
            gateway_subscription_id: Some("sub_abc".to_string()),
            current_period_start: now,
            current_period_end: Some(now + chrono::Duration::days(30)),
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn well_formed_row_decodes() {
        let sub = Subscription::try_from(row()).unwrap();
        assert_eq!(sub.plan, PlanId::Monthly);
    }

    #[test]
    fn unknown_plan_fails_decoding() {
        let mut r = row();
        r.plan = "premium".to_string();
        assert!(matches!(
            Subscription::try_from(r),
            Err(DbError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_status_fails_decoding() {
        let mut r = row();
        r.status = "unpaid".to_string();
        assert!(matches!(
            Subscription::try_from(r),
            Err(DbError::Malformed(_))
        ));
    }

    #[test]
    fn missing_period_end_fails_decoding() {
        let mut r = row();
        r.current_period_end = None;
        assert!(matches!(
            Subscription::try_from(r),
            Err(DbError::Malformed(_))
        ));
    }
}
