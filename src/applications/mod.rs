use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod export;
pub mod handlers;
pub mod id;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(max_document_bytes: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::public_router())
        .merge(handlers::student_router())
        .merge(handlers::admin_router())
        .layer(handlers::body_limit(max_document_bytes))
}
