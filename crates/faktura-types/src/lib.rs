//! Faktura Types - Shared domain types
//!
//! This crate contains domain types used across Faktura services:
//! - Plan catalog and pricing
//! - Subscription records and lifecycle status
//! - The entitlement policy (watermark gating)

pub mod entitlement;
pub mod plan;
pub mod subscription;
pub mod user;

pub use entitlement::*;
pub use plan::*;
pub use subscription::*;
pub use user::*;
