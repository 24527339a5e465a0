//! Stripe integration for subscriptions.
//!
//! Stripe handles:
//! - Customers and hosted checkout
//! - Subscription price changes and cancellation
//! - Webhook delivery of subscription and invoice events
//! - Payment methods and invoice history

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{StripeClient, StripeError, STRIPE_API_VERSION};
pub use types::*;
pub use webhook::{sign_payload, verify_signature};
