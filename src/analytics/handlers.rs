use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{AnalyticsReport, StatusCounts};
use super::services;
use crate::applications::services::now_utc;
use crate::auth::extractors::AdminSession;
use crate::error::AppError;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(dashboard))
        .route("/admin/analytics", get(analytics))
}

#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<StatusCounts>, AppError> {
    Ok(Json(services::dashboard(&state).await?))
}

#[instrument(skip_all)]
pub async fn analytics(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<AnalyticsReport>, AppError> {
    Ok(Json(services::analytics_report(&state, now_utc().date()).await?))
}
