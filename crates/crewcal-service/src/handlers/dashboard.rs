//! Dashboard loader.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crewcal_core::{
    event_distribution, team_insights, upcoming_events, MonthlyEvents, SystemAccountId,
    TeamInsights, TeamMember, UpcomingEvents, UPCOMING_WINDOW_DAYS,
};
use crewcal_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Everything the dashboard shows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Headline numbers.
    pub insights: TeamInsights,
    /// Events per calendar month.
    pub event_distribution: Vec<MonthlyEvents>,
    /// Events in the next 30 days.
    pub upcoming_events: UpcomingEvents,
}

/// Run one read against the account's members on the blocking pool.
async fn with_members<T, F>(
    store: &Arc<dyn Store>,
    account: SystemAccountId,
    compute: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&[TeamMember]) -> T + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || -> Result<T, ApiError> {
        let members = store.list_team_members(&account)?;
        Ok(compute(&members))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("dashboard task failed: {e}")))?
}

/// `GET /v1/dashboard`
///
/// The three reads run concurrently; the first failure fails the response.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let account = state.ensure_profile(&user)?.system_account_id;
    let today: NaiveDate = Utc::now().date_naive();

    let (insights, event_distribution, upcoming_events) = tokio::try_join!(
        with_members(&state.store, account, move |m| team_insights(m, today)),
        with_members(&state.store, account, event_distribution),
        with_members(&state.store, account, move |m| {
            upcoming_events(m, today, UPCOMING_WINDOW_DAYS)
        }),
    )?;

    Ok(Json(DashboardResponse {
        insights,
        event_distribution,
        upcoming_events,
    }))
}
