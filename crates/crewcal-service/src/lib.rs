//! Crewcal HTTP API Service.
//!
//! This crate provides the HTTP API for crewcal, including:
//!
//! - Plan listing and subscription management (checkout, plan changes,
//!   cancellation, reactivation)
//! - Stripe webhook reconciliation
//! - Team member import from CSV / XLSX / XLS files
//! - The dashboard aggregates
//!
//! # Authentication
//!
//! End-user requests carry a bearer JWT from the identity provider. Stripe
//! webhooks are authenticated by their `Stripe-Signature` header instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for a uniform signature

pub mod auth;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod import;
pub mod provider;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use provider::BillingProvider;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
