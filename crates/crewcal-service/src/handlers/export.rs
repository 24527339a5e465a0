//! Team member export download.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use serde::Deserialize;

use crewcal_core::{export_rows, ExportDateFormat};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::import::write_csv;
use crate::state::AppState;

/// Download file name, without extension.
const EXPORT_FILENAME: &str = "team-members";

/// Query parameters of an export.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    /// File format; only `csv` is offered.
    pub format: Option<String>,
    /// Date rendering, e.g. `DD/MM/YYYY`. Defaults to `YYYY-MM-DD`.
    pub date_format: Option<String>,
}

/// `GET /v1/team-members/export?format=csv&dateFormat=DD/MM/YYYY`
///
/// An account without members gets a single template row to fill in.
pub async fn export_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(format) = query.format.as_deref() {
        if !format.eq_ignore_ascii_case("csv") {
            return Err(ApiError::BadRequest(format!(
                "Unsupported export format: {format}. Only csv is available."
            )));
        }
    }
    let date_format: ExportDateFormat = match query.date_format.as_deref() {
        Some(label) => label.parse()?,
        None => ExportDateFormat::default(),
    };

    let account = state.ensure_profile(&user)?.system_account_id;
    let store = Arc::clone(&state.store);

    let (count, body) = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let members = store.list_team_members(&account)?;
        let rows = export_rows(&members, date_format);
        let body = write_csv(&rows)
            .map_err(|e| ApiError::Internal(format!("export encoding failed: {e}")))?;
        Ok((members.len(), body))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("export task failed: {e}")))??;

    tracing::info!(
        system_account_id = %account,
        members = count,
        date_format = %date_format,
        "Team members exported"
    );

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}.csv\""),
            ),
        ],
        body,
    ))
}
