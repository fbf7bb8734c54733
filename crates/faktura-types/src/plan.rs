//! Plan catalog
//!
//! A closed set of purchasable plans with fixed EUR pricing. Lookups over the
//! closed enum are total; parsing an unknown plan id from untrusted input is
//! a loud error, never a silent fallback to the free tier.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Plan identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    /// Free tier - watermarked output
    Free,
    /// One-time purchase - a single watermark-free document
    Single,
    /// Monthly subscription
    Monthly,
    /// Yearly subscription
    Yearly,
}

/// How a plan bills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Never billed
    None,
    /// Charged once, no recurring period
    OneTime,
    /// Renews every 30 days
    Monthly,
    /// Renews every 365 days
    Yearly,
}

impl BillingInterval {
    /// Length of one paid period, if the interval is recurring.
    ///
    /// The returned duration is applied exactly once, when a period boundary
    /// is written. Period ends are stored and trusted afterwards, never
    /// re-derived from the current clock at read time.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Self::None | Self::OneTime => None,
            Self::Monthly => Some(Duration::days(30)),
            Self::Yearly => Some(Duration::days(365)),
        }
    }

    /// Whether this interval produces a recurring subscription
    pub const fn is_recurring(&self) -> bool {
        matches!(self, Self::Monthly | Self::Yearly)
    }
}

/// Catalog entry for a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plan {
    /// Plan identifier
    pub id: PlanId,
    /// Price in minor currency units (cents)
    pub price_minor_units: i64,
    /// ISO currency code
    pub currency: &'static str,
    /// Billing interval
    pub billing_interval: BillingInterval,
    /// Whether a paid-up subscription on this plan removes the watermark
    pub grants_watermark_removal: bool,
}

/// The full plan catalog
pub const PLAN_CATALOG: [Plan; 4] = [
    Plan {
        id: PlanId::Free,
        price_minor_units: 0,
        currency: "EUR",
        billing_interval: BillingInterval::None,
        grants_watermark_removal: false,
    },
    Plan {
        id: PlanId::Single,
        price_minor_units: 199,
        currency: "EUR",
        billing_interval: BillingInterval::OneTime,
        grants_watermark_removal: true,
    },
    Plan {
        id: PlanId::Monthly,
        price_minor_units: 999,
        currency: "EUR",
        billing_interval: BillingInterval::Monthly,
        grants_watermark_removal: true,
    },
    Plan {
        id: PlanId::Yearly,
        price_minor_units: 9999,
        currency: "EUR",
        billing_interval: BillingInterval::Yearly,
        grants_watermark_removal: true,
    },
];

impl Plan {
    /// Look up a plan by its id. Total over the closed enum.
    pub const fn get(id: PlanId) -> &'static Plan {
        match id {
            PlanId::Free => &PLAN_CATALOG[0],
            PlanId::Single => &PLAN_CATALOG[1],
            PlanId::Monthly => &PLAN_CATALOG[2],
            PlanId::Yearly => &PLAN_CATALOG[3],
        }
    }

    /// Look up a plan from an untrusted id string.
    ///
    /// Unknown ids are a configuration error at the caller and must surface,
    /// not default to free.
    pub fn lookup(id: &str) -> Result<&'static Plan, PlanParseError> {
        let id: PlanId = id.parse()?;
        Ok(Self::get(id))
    }
}

impl PlanId {
    /// Shortcut for the catalog entry
    pub const fn plan(&self) -> &'static Plan {
        Plan::get(*self)
    }

    /// Whether checkout on this plan produces a recurring subscription
    pub const fn is_recurring(&self) -> bool {
        self.plan().billing_interval.is_recurring()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Single => write!(f, "single"),
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for PlanId {
    type Err = PlanParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "single" => Ok(Self::Single),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(PlanParseError(s.to_string())),
        }
    }
}

/// Error parsing a plan id string
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown plan id: {0}")]
pub struct PlanParseError(pub String);
