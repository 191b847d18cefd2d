use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{StatusCode, Uri},
    routing::get,
};
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir};

use crate::state::AppState;

pub mod doc;
pub mod health;
pub mod maintenance;
pub mod upload;
pub mod users;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Every route of the upload server with its state applied. Tracing, request
/// ids and concurrency limits are layered on by the binary.
pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.config.upload_dir.clone());

    Router::new()
        .route("/", get(health::banner))
        .route("/healthz", get(health::health_check))
        .merge(upload::router())
        .merge(maintenance::router())
        .nest("/api", users::router())
        .nest_service("/static", static_files)
        .merge(doc::scalar_docs())
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not Found", "path": uri.path() })),
    )
}
