//! Team member spreadsheet upload.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::import::{import_team_members, ImportSummary, StoreSink};
use crate::state::AppState;

/// Query parameters of an upload.
#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    /// Original file name; its extension selects the parser.
    pub filename: String,
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    /// Always `true`; failures are error responses.
    pub success: bool,
    /// Row counts.
    #[serde(flatten)]
    pub summary: ImportSummary,
}

/// `POST /v1/team-members/import?filename=team.xlsx`
///
/// The request body is the raw file.
pub async fn import_members(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<Json<ImportResponse>, ApiError> {
    let account = state.ensure_profile(&user)?.system_account_id;
    let store = Arc::clone(&state.store);
    let filename = query.filename;

    let summary = tokio::task::spawn_blocking(move || {
        let sink = StoreSink::new(store.as_ref());
        import_team_members(store.as_ref(), &sink, &account, &filename, &body)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("import task failed: {e}")))??;

    Ok(Json(ImportResponse {
        success: true,
        summary,
    }))
}
