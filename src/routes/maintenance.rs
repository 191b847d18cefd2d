use axum::{
    Json, Router,
    extract::{Query, State},
    routing::delete,
};

use crate::{
    dto::upload::{PurgeQuery, PurgeReport},
    error::AppResult,
    response::ApiResponse,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/purge-old-uploads", delete(purge_old_uploads))
}

#[utoipa::path(
    delete,
    path = "/purge-old-uploads",
    params(PurgeQuery),
    responses(
        (status = 200, description = "Local uploads older than `days` removed", body = PurgeReport),
    ),
    tag = "Maintenance"
)]
pub async fn purge_old_uploads(
    State(state): State<AppState>,
    Query(query): Query<PurgeQuery>,
) -> AppResult<Json<ApiResponse<PurgeReport>>> {
    let removed = state.local.purge_older_than(query.days()).await?;
    Ok(Json(ApiResponse::success(PurgeReport {
        removed_count: removed.len(),
        removed,
    })))
}
