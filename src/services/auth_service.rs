use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;

use crate::{
    dto::auth::{Claims, LoginRequest, RegisterRequest},
    error::{AppError, AppResult, FieldError},
    models::{Role, User, UserRecord},
    store::BackingStore,
};

const TOKEN_TTL_HOURS: i64 = 24;

/// The signed-in identity of the current session, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    pub fn current(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    pub fn sign_in(&mut self, user: User) {
        self.user = Some(user);
    }

    pub fn sign_out(&mut self) -> Option<User> {
        self.user.take()
    }
}

/// Fails with `Forbidden` unless an admin is signed in.
pub fn ensure_admin(session: &Session) -> AppResult<&User> {
    match session.current() {
        Some(user) if user.is_admin() => Ok(user),
        _ => Err(AppError::Forbidden),
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub async fn register(store: &dyn BackingStore, payload: RegisterRequest) -> AppResult<User> {
    let RegisterRequest {
        username,
        email,
        password,
        confirm_password,
    } = payload;
    let username = username.trim().to_string();
    let email = email.trim().to_string();

    let mut fields = Vec::new();
    if username.is_empty() {
        fields.push(FieldError::new("username", "Username is required"));
    }
    if email.is_empty() {
        fields.push(FieldError::new("email", "Email is required"));
    }
    if password.is_empty() {
        fields.push(FieldError::new("password", "Password is required"));
    }
    if !fields.is_empty() {
        return Err(AppError::Validation(fields));
    }
    if password != confirm_password {
        return Err(AppError::Auth("Passwords do not match".into()));
    }

    let taken = store
        .fetch_users()
        .await?
        .iter()
        .any(|u| u.username == username || u.email.eq_ignore_ascii_case(&email));
    if taken {
        return Err(AppError::Auth("Username or email already exists".into()));
    }

    let user = store
        .upsert_user(UserRecord {
            id: None,
            username,
            email,
            role: Role::Customer,
            password_hash: Some(hash_password(&password)?),
        })
        .await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

pub async fn login(store: &dyn BackingStore, payload: LoginRequest) -> AppResult<User> {
    let LoginRequest { email, password } = payload;
    let invalid = || AppError::Auth("Invalid email or password".into());

    let credentials = store
        .find_credentials(email.trim())
        .await?
        .ok_or_else(invalid)?;
    let hash = credentials.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&password, hash) {
        return Err(invalid());
    }

    tracing::info!(user_id = %credentials.user.id, "user logged in");
    Ok(credentials.user)
}

/// Mints an HS256 bearer token valid for 24 hours.
pub fn issue_token(user: &User, secret: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.clone(),
        role: user.role.as_str().to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}
