//! JSON API served under `/api/` plus the health check.

pub mod auth;
pub mod health;
pub mod pagination;
pub mod tags;
pub mod tasks;
pub mod users;
pub mod validation;

use axum::Router;
use axum::http::Uri;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;

/// Build the API router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health/", get(health::health))
        // Accounts
        .route("/api/auth/register/", post(auth::register))
        .route("/api/auth/login/", post(auth::login))
        .route("/api/auth/refresh/", post(auth::refresh))
        .route("/api/auth/logout/", post(auth::logout))
        .route("/api/users/", get(users::list_users))
        .route("/api/users/me/", get(users::current_user))
        .route(
            "/api/users/{id}/",
            get(users::get_user).put(users::update_user),
        )
        // Tasks
        .route(
            "/api/tasks/",
            get(tasks::list_tasks).post(tasks::create_task),
        )
        .route(
            "/api/tasks/{id}/",
            get(tasks::get_task)
                .put(tasks::replace_task)
                .patch(tasks::patch_task)
                .delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/assign", post(tasks::assign))
        .route("/api/tasks/{id}/assign/", post(tasks::assign))
        .route("/api/tasks/{id}/assignments/", get(tasks::list_assignments))
        .route("/api/tags/", get(tags::list_tags))
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("No route for {}", uri.path()))
}

/// Run store work on the blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
}
