//! Registration and token endpoints. All of these are anonymous.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::blocking;
use super::users::UserProfile;
use super::validation::{validate_email, validate_nickname, validate_username};
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::{TokenPair, TokenType};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::NewUser;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub nickname: String,
}

/// `POST /api/auth/register/`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let Json(body) = payload?;
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_string();

    validate_username(&username)?;
    validate_email(&email)?;
    validate_nickname(&body.nickname)?;
    if body.password.is_empty() {
        return Err(ApiError::missing_field("password"));
    }
    let problems = validate_password(&body.password, &username, &email);
    if !problems.is_empty() {
        return Err(ApiError::invalid_value("password", problems.join(" ")));
    }

    let password = body.password;
    let password_hash = blocking(move || hash_password(&password)).await?;

    let new_user = NewUser {
        username,
        email,
        nickname: body.nickname,
        password_hash,
        is_staff: false,
        is_superuser: false,
    };
    let db = state.db().clone();
    let user = blocking(move || db.create_user(&new_user)).await?;
    info!(user_id = user.id, username = %user.username, "Registered user");

    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /api/auth/login/`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenPair>> {
    let Json(body) = payload?;
    if body.username.is_empty() {
        return Err(ApiError::missing_field("username"));
    }
    if body.password.is_empty() {
        return Err(ApiError::missing_field("password"));
    }

    let Some((user, hash)) = state.db().get_credentials(&body.username)? else {
        warn!(username = %body.username, "Login for unknown or inactive user");
        return Err(ApiError::invalid_credentials());
    };

    let password = body.password;
    let valid = blocking(move || verify_password(&password, &hash)).await?;
    if !valid {
        warn!(user_id = user.id, "Login with wrong password");
        return Err(ApiError::invalid_credentials());
    }

    let pair = state
        .tokens()
        .issue_pair(user.id)
        .map_err(ApiError::internal)?;
    state.db().record_login(user.id)?;

    Ok(Json(pair))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub access: String,
}

/// `POST /api/auth/refresh/`
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<AccessResponse>> {
    let Json(body) = payload?;
    let token = body
        .refresh
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::missing_field("refresh"))?;

    let claims = state
        .tokens()
        .decode(&token, TokenType::Refresh)
        .map_err(ApiError::token_invalid)?;

    if state.db().is_token_blacklisted(&claims.jti)? {
        return Err(ApiError::token_invalid("token is blacklisted"));
    }
    if state.db().get_user(claims.user_id)?.is_none() {
        return Err(ApiError::token_invalid("user not found or inactive"));
    }

    let access = state
        .tokens()
        .issue(claims.user_id, TokenType::Access)
        .map_err(ApiError::internal)?;
    Ok(Json(AccessResponse { access }))
}

/// `POST /api/auth/logout/`: revoke a refresh token.
pub async fn logout(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(body) = payload?;
    let token = body
        .refresh
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::missing_field("refresh"))?;

    let claims = state
        .tokens()
        .decode(&token, TokenType::Refresh)
        .map_err(ApiError::token_invalid)?;

    state
        .db()
        .blacklist_token(&claims.jti, claims.user_id, claims.exp * 1000)?;
    info!(user_id = claims.user_id, "Refresh token revoked");

    Ok(Json(serde_json::json!({})))
}
