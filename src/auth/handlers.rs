use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    applications::dto::MessageResponse,
    auth::{
        dto::{AdminLoginRequest, AuthResponse, LogoutRequest, RefreshRequest, Role, StudentLoginRequest},
        extractors::{AdminSession, StudentSession},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/student/login", post(student_login))
        .route("/auth/student/logout", post(student_logout))
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/admin/logout", post(admin_logout))
        .route("/auth/refresh", post(refresh))
}

#[instrument(skip(state, payload))]
pub async fn student_login(
    State(state): State<AppState>,
    Json(payload): Json<StudentLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::student_login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::admin_login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::refresh(&state, &payload.refresh_token).await?))
}

#[instrument(skip_all)]
pub async fn student_logout(
    State(state): State<AppState>,
    StudentSession(session): StudentSession,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    services::logout(&state, &session, Role::Student, payload.refresh_token.as_deref()).await?;
    Ok(Json(MessageResponse::new("You have been logged out.")))
}

#[instrument(skip_all)]
pub async fn admin_logout(
    State(state): State<AppState>,
    AdminSession(session): AdminSession,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<MessageResponse>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    services::logout(&state, &session, Role::Admin, payload.refresh_token.as_deref()).await?;
    Ok(Json(MessageResponse::new("Admin logged out successfully.")))
}
