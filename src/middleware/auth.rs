use std::str::FromStr;

use axum::{extract::FromRequestParts, http::header};

use crate::{
    error::AppError,
    models::Role,
    services::auth_service::decode_token,
    state::AppState,
};

/// Caller identified by a bearer token minted by `auth_service::issue_token`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let Some(secret) = state.config.jwt_secret.as_deref() else {
            tracing::warn!("JWT_SECRET is not set, rejecting bearer token");
            return Err(AppError::Unauthorized);
        };

        let claims = decode_token(token, secret)?;
        let role = Role::from_str(&claims.role).map_err(|_| AppError::Unauthorized)?;

        Ok(AuthUser {
            user_id: claims.sub,
            role,
        })
    }
}
