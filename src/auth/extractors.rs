use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::dto::{Role, Session};
use super::services::session_from_token;
use crate::error::AppError;
use crate::state::AppState;

/// A logged-in applicant. `subject` is their application ID.
pub struct StudentSession(pub Session);

/// A logged-in administrator. `subject` is the username.
pub struct AdminSession(pub Session);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    // Read Authorization header
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Please login first!"))?;

    // Expect "Bearer <token>"
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or_else(|| AppError::unauthorized("invalid auth scheme"))
}

#[async_trait]
impl FromRequestParts<AppState> for StudentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        Ok(StudentSession(session_from_token(state, token, Role::Student).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        Ok(AdminSession(session_from_token(state, token, Role::Admin).await?))
    }
}
