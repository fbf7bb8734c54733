//! Entitlement policy
//!
//! The single implementation of the watermark-gating predicates. Every
//! component that needs to know "is this user Pro" imports these functions;
//! nothing re-derives them locally.
//!
//! All predicates are pure functions of a nullable subscription and one
//! caller-supplied `now`. They never fail: a missing record is the free tier,
//! and the free tier is never entitled. Callers must fetch `now` once per
//! evaluation and pass the same instant to every predicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PlanId, Subscription, SubscriptionStatus};

/// Whether the subscription currently grants access.
///
/// `past_due` still grants access: a failed renewal charge gets a grace
/// period until the paid window runs out.
pub fn is_active(sub: Option<&Subscription>, now: DateTime<Utc>) -> bool {
    match sub {
        None => false,
        Some(sub) => {
            matches!(
                sub.status,
                SubscriptionStatus::Active | SubscriptionStatus::PastDue
            ) && now <= sub.current_period_end
        }
    }
}

/// Whether documents may be produced without a watermark.
pub fn grants_watermark_removal(sub: Option<&Subscription>, now: DateTime<Utc>) -> bool {
    match sub {
        None => false,
        Some(s) => is_active(sub, now) && s.plan != PlanId::Free,
    }
}

/// Whether the account presents as Pro.
///
/// A canceled-but-not-yet-expired paid plan still shows as Pro: the
/// subscriber paid for the running period.
pub fn display_as_pro(sub: Option<&Subscription>, now: DateTime<Utc>) -> bool {
    if grants_watermark_removal(sub, now) {
        return true;
    }
    match sub {
        None => false,
        Some(s) => s.cancel_at_period_end && now <= s.current_period_end && s.plan != PlanId::Free,
    }
}

/// Evaluated entitlements, bundled so one `now` covers every predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    /// The one bit the invoice renderer consumes
    pub suppress_watermark: bool,
    /// Badge state for account surfaces
    pub display_as_pro: bool,
    /// Raw activity predicate
    pub is_active: bool,
}

impl Entitlements {
    /// Evaluate the full policy at a single instant.
    pub fn evaluate(sub: Option<&Subscription>, now: DateTime<Utc>) -> Self {
        Self {
            suppress_watermark: grants_watermark_removal(sub, now),
            display_as_pro: display_as_pro(sub, now),
            is_active: is_active(sub, now),
        }
    }

    /// The free-tier default: watermarked, not Pro.
    pub const fn none() -> Self {
        Self {
            suppress_watermark: false,
            display_as_pro: false,
            is_active: false,
        }
    }
}
