//! Core types and pure logic for crewcal.
//!
//! This crate holds everything that does not touch the network or disk:
//!
//! - **Identifiers**: `UserId`, `SystemAccountId`, `DepartmentId`, `TeamMemberId`
//! - **Subscriptions**: `SubscriptionRecord`, `SubscriptionStatus` and the
//!   transitions driven by provider events and user actions
//! - **Pricing**: `PricingConfig`, `PlanTier`, `PlanPrice`, `compare_plans`
//! - **Dates**: the format-agnostic `parse_date`
//! - **Imports**: `process_rows`, turning raw spreadsheet rows into `ImportedMember`s
//! - **Exports**: `export_rows`, rendering members with a chosen date format
//! - **Insights**: dashboard aggregates over team members
//!
//! # Money
//!
//! Plan list prices are whole currency units (the pricing table shown to users).
//! Amounts reported by the payment provider are integer cents and stay `i64`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod dates;
pub mod error;
pub mod export;
pub mod ids;
pub mod import;
pub mod insights;
pub mod pricing;
pub mod profile;
pub mod subscription;
pub mod team;

pub use dates::{format_date, parse_date};
pub use error::{CoreError, Result};
pub use export::{export_rows, ExportDateFormat, ExportRow, EXPORT_HEADERS};
pub use ids::{DepartmentId, IdError, SystemAccountId, TeamMemberId, UserId};
pub use import::{process_rows, ImportedMember, RawRow};
pub use insights::{
    event_distribution, team_insights, upcoming_events, MonthlyEvents, TeamInsights,
    UpcomingEvent, UpcomingEventKind, UpcomingEvents, UPCOMING_WINDOW_DAYS,
};
pub use pricing::{
    compare_plans, tier_rank, BillingFrequency, LoyaltyDiscount, PlanChange, PlanPrice,
    PlanQuote, PlanTier, PricingConfig, TierPrice,
};
pub use profile::Profile;
pub use subscription::{
    months_between, PlanDescriptor, ScheduledPlan, SubscriptionRecord, SubscriptionSnapshot,
    SubscriptionStatus,
};
pub use team::{Department, Gender, TeamMember};
