//! Property-based tests for the entitlement policy
//!
//! The policy is the single predicate set every component imports; these
//! properties pin down its fail-closed behavior across the whole state
//! space of subscription records.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use faktura_billing_core::{display_as_pro, grants_watermark_removal, is_active, Entitlements};
use faktura_types::{
    PlanId, Subscription, SubscriptionId, SubscriptionStatus, UserId,
};

fn arb_plan() -> impl Strategy<Value = PlanId> {
    prop_oneof![
        Just(PlanId::Free),
        Just(PlanId::Single),
        Just(PlanId::Monthly),
        Just(PlanId::Yearly),
    ]
}

fn arb_status() -> impl Strategy<Value = SubscriptionStatus> {
    prop_oneof![
        Just(SubscriptionStatus::Active),
        Just(SubscriptionStatus::Canceled),
        Just(SubscriptionStatus::Expired),
        Just(SubscriptionStatus::PastDue),
    ]
}

prop_compose! {
    /// Arbitrary subscription with a period window around a fixed epoch
    fn arb_subscription()(
        plan in arb_plan(),
        status in arb_status(),
        cancel_at_period_end in any::<bool>(),
        period_days in 1i64..400,
        has_gateway_id in any::<bool>(),
    ) -> Subscription {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Subscription {
            id: SubscriptionId::new(),
            user_id: UserId::new(),
            plan,
            status,
            current_period_start: start,
            current_period_end: start + Duration::days(period_days),
            cancel_at_period_end,
            gateway_subscription_id: has_gateway_id.then(|| "sub_prop".to_string()),
            created_at: start,
            updated_at: start,
        }
    }
}

fn arb_now() -> impl Strategy<Value = DateTime<Utc>> {
    // Clock positions before, inside, and well past any generated period
    (-100i64..600).prop_map(|days| {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(days)
    })
}

proptest! {
    /// Free-plan records never remove the watermark, whatever their status
    /// or dates say
    #[test]
    fn prop_free_plan_never_entitled(mut sub in arb_subscription(), now in arb_now()) {
        sub.plan = PlanId::Free;
        prop_assert!(!grants_watermark_removal(Some(&sub), now));
        prop_assert!(!display_as_pro(Some(&sub), now));
    }

    /// An active paid record inside its paid window is entitled
    #[test]
    fn prop_active_paid_within_period_entitled(mut sub in arb_subscription(), now in arb_now()) {
        sub.status = SubscriptionStatus::Active;
        prop_assume!(sub.plan != PlanId::Free);
        prop_assume!(now <= sub.current_period_end);
        prop_assert!(grants_watermark_removal(Some(&sub), now));
    }

    /// Past the period end nothing is entitled, regardless of status
    #[test]
    fn prop_past_period_end_never_entitled(sub in arb_subscription(), now in arb_now()) {
        prop_assume!(now > sub.current_period_end);
        prop_assert!(!is_active(Some(&sub), now));
        prop_assert!(!grants_watermark_removal(Some(&sub), now));
    }

    /// A canceled-but-running paid plan still presents as Pro
    #[test]
    fn prop_canceled_but_running_shows_pro(mut sub in arb_subscription(), now in arb_now()) {
        sub.cancel_at_period_end = true;
        prop_assume!(sub.plan != PlanId::Free);
        prop_assume!(now <= sub.current_period_end);
        prop_assert!(display_as_pro(Some(&sub), now));
    }

    /// Watermark removal implies the Pro badge, never the other way only
    #[test]
    fn prop_entitlement_implies_pro(sub in arb_subscription(), now in arb_now()) {
        if grants_watermark_removal(Some(&sub), now) {
            prop_assert!(display_as_pro(Some(&sub), now));
        }
    }

    /// Expired and canceled statuses never grant access
    #[test]
    fn prop_terminal_statuses_not_active(mut sub in arb_subscription(), now in arb_now()) {
        for status in [SubscriptionStatus::Expired, SubscriptionStatus::Canceled] {
            sub.status = status;
            prop_assert!(!is_active(Some(&sub), now));
            prop_assert!(!grants_watermark_removal(Some(&sub), now));
        }
    }

    /// The bundled evaluation agrees with the individual predicates
    #[test]
    fn prop_bundle_matches_predicates(sub in arb_subscription(), now in arb_now()) {
        let ent = Entitlements::evaluate(Some(&sub), now);
        prop_assert_eq!(ent.is_active, is_active(Some(&sub), now));
        prop_assert_eq!(ent.suppress_watermark, grants_watermark_removal(Some(&sub), now));
        prop_assert_eq!(ent.display_as_pro, display_as_pro(Some(&sub), now));
    }

    /// The absent record is the free tier: nothing is ever granted
    #[test]
    fn prop_absent_record_never_entitled(now in arb_now()) {
        prop_assert!(!is_active(None, now));
        prop_assert!(!grants_watermark_removal(None, now));
        prop_assert!(!display_as_pro(None, now));
    }
}
