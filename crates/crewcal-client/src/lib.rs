//! Crewcal Client SDK.
//!
//! Typed access to the crewcal API for frontends and tools acting on behalf
//! of a signed-in user.
//!
//! # Example
//!
//! ```no_run
//! use crewcal_client::{CrewcalClient, PlanChangeOutcome};
//! use crewcal_core::{BillingFrequency, PlanTier};
//!
//! # async fn example() -> Result<(), crewcal_client::ClientError> {
//! let client = CrewcalClient::new("http://crewcal:8080", "user-access-token")?;
//!
//! match client.change_plan(PlanTier::Pro, BillingFrequency::Yearly).await? {
//!     PlanChangeOutcome::Updated { message, .. } => println!("{message}"),
//!     PlanChangeOutcome::Redirect { url } => println!("Complete checkout at {url}"),
//! }
//!
//! let dashboard = client.dashboard().await?;
//! println!("{} team members", dashboard.insights.total_members);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, CrewcalClient};
pub use error::ClientError;
pub use types::{
    ActionResponse, CheckoutSession, Dashboard, ImportSummary, Invoice, PaymentMethod,
    PlanChangeOutcome, PlanRequest, PlansResponse, SubscriptionResponse,
};
