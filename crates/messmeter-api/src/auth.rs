use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use messmeter_core::config::PointsConfig;
use messmeter_db::Database;
use messmeter_gateway::dispatcher::Dispatcher;
use messmeter_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use messmeter_types::models::Role;

use crate::error::ApiError;
use crate::insights::AnalysisClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub points: PointsConfig,
    pub dispatcher: Dispatcher,
    /// Present only when an analysis service is configured.
    pub analysis: Option<AnalysisClient>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::bad_request(
            "username must be between 3 and 32 characters",
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    if req.display_name.trim().is_empty() {
        return Err(ApiError::bad_request("display name must not be empty"));
    }

    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "that username is already taken",
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    state.db.create_user(
        &user_id.to_string(),
        &req.username,
        &password_hash,
        req.display_name.trim(),
        req.room.trim(),
        Role::Student,
    )?;

    let token = create_token(&state.jwt_secret, user_id, &req.username, Role::Student)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or_else(ApiError::unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password).map_err(|_| ApiError::internal())?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::unauthorized())?;

    let profile = user.into_profile()?;
    let token = create_token(
        &state.jwt_secret,
        profile.id,
        &profile.username,
        profile.role,
    )?;

    Ok(Json(LoginResponse {
        user_id: profile.id,
        username: profile.username,
        role: profile.role,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .db
        .get_profile(claims.sub)?
        .ok_or_else(|| ApiError::not_found("account no longer exists"))?;

    Ok(Json(profile))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| ApiError::internal())
}

fn create_token(secret: &str, user_id: Uuid, username: &str, role: Role) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
