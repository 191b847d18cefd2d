use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::{auth::UserProfileRequest, upload::UserProfile},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Role, UserRecord},
    response::ApiResponse,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/users", post(upsert_profile))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = UserProfileRequest,
    responses(
        (status = 200, description = "Profile stored", body = UserProfile),
        (status = 400, description = "Missing uid or email"),
        (status = 401, description = "Invalid token"),
        (status = 403, description = "Token belongs to another user"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn upsert_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(payload): Json<UserProfileRequest>,
) -> AppResult<Json<ApiResponse<UserProfile>>> {
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(uid), Some(email)) = (non_empty(payload.uid), non_empty(payload.email)) else {
        return Err(AppError::BadRequest("Missing uid or email".into()));
    };
    if caller.user_id != uid && !caller.is_admin() {
        return Err(AppError::Forbidden);
    }

    let username = non_empty(payload.name).unwrap_or_else(|| email.clone());
    let role = state
        .store
        .fetch_users()
        .await?
        .into_iter()
        .find(|u| u.id == uid)
        .map_or(Role::Customer, |u| u.role);
    let user = state
        .store
        .upsert_user(UserRecord {
            id: Some(uid),
            username,
            email,
            role,
            password_hash: None,
        })
        .await?;
    tracing::info!(
        user_id = %user.id,
        provider = payload.provider.as_deref().unwrap_or("password"),
        "profile upserted"
    );
    Ok(Json(ApiResponse::success(UserProfile { user })))
}
