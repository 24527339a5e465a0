//! Error types for crewcal domain logic.

use crate::ids::IdError;
use crate::subscription::SubscriptionStatus;

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by pure domain transitions and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A user action is not allowed from the subscription's current state.
    #[error("subscription is {status}; {action} is not allowed")]
    InvalidTransition {
        /// Current status.
        status: SubscriptionStatus,
        /// The attempted action.
        action: &'static str,
    },

    /// Reactivation was requested but nothing is scheduled for cancellation.
    #[error("Subscription is not scheduled for cancellation")]
    NotPendingCancellation,

    /// The provider reported a status string we do not model.
    #[error("unknown subscription status: {0}")]
    UnknownStatus(String),

    /// A plan identifier that is not in the pricing table.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// A billing frequency other than monthly or yearly.
    #[error("unknown billing frequency: {0}")]
    UnknownFrequency(String),

    /// An export date format we do not offer.
    #[error("unknown date format: {0}")]
    UnknownDateFormat(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
