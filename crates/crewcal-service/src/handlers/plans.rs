//! Public plan listing.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crewcal_core::{BillingFrequency, PlanQuote};

use crate::state::AppState;

/// Plan listing response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansResponse {
    /// Every tier with its monthly and yearly price.
    pub plans: Vec<PlanQuote>,
    /// Label for the yearly discount, e.g. `"25%"`.
    pub yearly_discount_percentage: Option<String>,
}

/// `GET /v1/plans`
pub async fn list_plans(State(state): State<Arc<AppState>>) -> Json<PlansResponse> {
    let pricing = &state.config.pricing;
    Json(PlansResponse {
        plans: pricing.quotes(),
        yearly_discount_percentage: pricing.discount_percentage(BillingFrequency::Yearly),
    })
}
