use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize, Debug, Clone, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Profile pushed by a signed-in client to `POST /api/users`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UserProfileRequest {
    pub uid: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub provider: Option<String>,
}
