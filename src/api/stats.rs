//! Statistics endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, models::LibrarySummary};

/// Library-wide counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Catalog, registry and loan counters", body = LibrarySummary)
    )
)]
pub async fn get_stats(State(state): State<crate::AppState>) -> AppResult<Json<LibrarySummary>> {
    let summary = state.services.stats.summary().await?;
    Ok(Json(summary))
}
