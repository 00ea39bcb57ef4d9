use axum::Json;
use axum::extract::State;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;
use crate::types::Tag;

/// `GET /api/tags/`: the whole catalog, ordered by name.
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.db().list_tags()?))
}
