use axum::{Json, extract::State};

use crate::{dto::upload::HealthData, state::AppState};

pub const BANNER: &str = "DairyHub upload endpoint";

pub async fn banner() -> &'static str {
    BANNER
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "OK", body = HealthData),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    Json(HealthData {
        ok: true,
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}
