//! Bearer-token extractor for authenticated handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use super::tokens::TokenType;
use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;
use crate::types::User;

/// The active user behind a valid `Authorization: Bearer <access>` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(ApiError::not_authenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(ApiError::not_authenticated)?;

        let claims = state
            .tokens()
            .decode(token, TokenType::Access)
            .map_err(|e| {
                debug!(error = %e, "Rejected access token");
                ApiError::token_invalid(e)
            })?;

        let user = state
            .db()
            .get_user(claims.user_id)?
            .ok_or_else(|| ApiError::new(ErrorCode::TokenInvalid, "User not found or inactive"))?;

        Ok(AuthUser(user))
    }
}
