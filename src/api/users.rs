//! Profile endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::Uri;
use serde::{Deserialize, Serialize};

use super::blocking;
use super::pagination::{Page, PageQuery, PageRequest};
use super::validation::{validate_email, validate_nickname, validate_username};
use crate::auth::AuthUser;
use crate::auth::password::{hash_password, validate_password};
use crate::auth::permissions::{can_list_users, can_update_profile, can_view_profile};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{User, UserUpdate};

/// Public representation of an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub nickname: String,
    pub is_staff: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            nickname: user.nickname.clone(),
            is_staff: user.is_staff,
        }
    }
}

/// `GET /api/users/` (staff only).
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<UserProfile>>> {
    if !can_list_users(&caller) {
        return Err(ApiError::forbidden("Only staff can list users"));
    }

    let limits = state.pagination();
    let request =
        PageRequest::from_query(&query, limits.user_page_size, limits.user_max_page_size)?;
    let (users, count) = state.db().list_users(request.page, request.page_size)?;
    let page = Page::new(&uri, request, count, users)?;

    Ok(Json(page.map(|u| UserProfile::from(&u))))
}

/// `GET /api/users/me/`.
pub async fn current_user(AuthUser(caller): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&caller))
}

/// `GET /api/users/{id}/`.
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<UserProfile>> {
    let target = state
        .db()
        .get_user(user_id)?
        .ok_or_else(|| ApiError::user_not_found(user_id))?;

    if !can_view_profile(&caller, &target) {
        return Err(ApiError::forbidden(
            "You do not have permission to view this profile",
        ));
    }
    Ok(Json(UserProfile::from(&target)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub password: Option<String>,
}

/// `PUT /api/users/{id}/` (self or staff).
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(user_id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let target = state
        .db()
        .get_user(user_id)?
        .ok_or_else(|| ApiError::user_not_found(user_id))?;

    if !can_update_profile(&caller, target.id) {
        return Err(ApiError::forbidden(
            "You do not have permission to update this profile",
        ));
    }

    let Json(body) = payload?;
    let username = body.username.unwrap_or_default().trim().to_string();
    let email = body.email.unwrap_or_default().trim().to_string();
    let nickname = body.nickname.unwrap_or(target.nickname);
    validate_username(&username)?;
    validate_email(&email)?;
    validate_nickname(&nickname)?;

    let password_hash = match body.password.filter(|p| !p.is_empty()) {
        Some(password) => {
            let problems = validate_password(&password, &username, &email);
            if !problems.is_empty() {
                return Err(ApiError::invalid_value("password", problems.join(" ")));
            }
            Some(blocking(move || hash_password(&password)).await?)
        }
        None => None,
    };

    let update = UserUpdate {
        username,
        email,
        nickname,
        password_hash,
    };
    let db = state.db().clone();
    let user = blocking(move || db.update_user(user_id, &update)).await?;

    Ok(Json(UserProfile::from(&user)))
}
