//! API handlers.

pub mod dashboard;
pub mod export;
pub mod health;
pub mod import;
pub mod plans;
pub mod subscription;
pub mod webhooks;
