//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{dashboard, export, health, import, plans, subscription, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for authenticated API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Maximum concurrent spreadsheet imports.
const IMPORT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/plans` - Plan prices
///
/// ## Subscription (bearer JWT)
/// - `GET /v1/subscription` - Current subscription and invoices
/// - `POST /v1/subscription/checkout` - Start a hosted checkout
/// - `POST /v1/subscription/change-plan` - Upgrade or downgrade
/// - `POST /v1/subscription/cancel` - Cancel at period end
/// - `POST /v1/subscription/reactivate` - Undo a pending cancellation
/// - `GET /v1/payment-methods` - Cards on file
///
/// ## Team (bearer JWT)
/// - `POST /v1/team-members/import?filename=` - Spreadsheet upload
/// - `GET /v1/team-members/export?format=csv&dateFormat=` - CSV download
/// - `GET /v1/dashboard` - Dashboard aggregates
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe` - Stripe events
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    // The import limit only wraps routes added before it.
    let team_routes = Router::new()
        .route("/import", post(import::import_members))
        .layer(ConcurrencyLimitLayer::new(IMPORT_MAX_CONCURRENT_REQUESTS))
        .route("/export", get(export::export_members));

    let api_routes = Router::new()
        .route("/plans", get(plans::list_plans))
        // Subscription
        .route("/subscription", get(subscription::get_subscription))
        .route("/subscription/checkout", post(subscription::start_checkout))
        .route("/subscription/change-plan", post(subscription::change_plan))
        .route("/subscription/cancel", post(subscription::cancel_subscription))
        .route(
            "/subscription/reactivate",
            post(subscription::reactivate_subscription),
        )
        .route("/payment-methods", get(subscription::list_payment_methods))
        // Team
        .nest("/team-members", team_routes)
        .route("/dashboard", get(dashboard::dashboard))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_seconds)))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}
