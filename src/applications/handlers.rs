use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use tracing::{instrument, warn};

use super::dto::{
    ApplicationForm, ApplicationList, BulkStatusRequest, BulkStatusResponse,
    DocumentStatusRequest, ListQuery, MessageResponse, PortalView, ProfileUpdateRequest,
    StatusUpdateRequest, StatusView, SubmissionReceipt, UploadedDocument,
};
use super::repo_types::Application;
use super::{export, services};
use crate::auth::extractors::{AdminSession, StudentSession};
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::content_type_for;

const DOCUMENT_FIELD: &str = "documents";

// multipart framing on top of the document cap
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/applications", post(submit))
        .route("/applications/status/:application_id", get(status))
}

pub fn student_router() -> Router<AppState> {
    Router::new()
        .route("/student/application", get(portal))
        .route("/student/profile", put(update_profile))
        .route("/student/documents", post(resubmit_document))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/applications", get(list))
        .route("/admin/courses", get(courses))
        .route("/admin/applications/bulk-status", post(bulk_status))
        .route("/admin/applications/:application_id", get(detail))
        .route("/admin/applications/:application_id/status", put(update_status))
        .route(
            "/admin/applications/:application_id/document-status",
            put(update_document_status),
        )
        .route("/admin/applications/:application_id/document", get(download_document))
        .route("/admin/export", get(export_csv))
}

/// Upload routes accept bodies slightly larger than the document cap so the
/// cap itself is reported as a validation error.
pub fn body_limit(max_document_bytes: usize) -> DefaultBodyLimit {
    DefaultBodyLimit::max(max_document_bytes + BODY_LIMIT_SLACK)
}

fn bad_multipart<E: std::fmt::Display>(e: E) -> AppError {
    warn!(error = %e, "malformed multipart body");
    AppError::validation("Malformed form data!")
}

/// Splits a multipart body into text fields and the optional document.
async fn read_multipart(
    mut mp: Multipart,
) -> Result<(ApplicationForm, Option<UploadedDocument>), AppError> {
    let mut form = ApplicationForm::default();
    let mut document = None;

    while let Some(field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == DOCUMENT_FIELD {
            let filename = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().unwrap_or_default().to_string();
            let body = field.bytes().await.map_err(bad_multipart)?;
            document = Some(UploadedDocument {
                filename,
                content_type,
                body,
            });
            continue;
        }

        let value = field.text().await.map_err(bad_multipart)?;
        match name.as_str() {
            "name" => form.name = value,
            "dob" => form.dob = value,
            "gender" => form.gender = value,
            "email" => form.email = value,
            "phone" => form.phone = value,
            "address" => form.address = value,
            "course" => form.course = value,
            "previous_education" => form.previous_education = value,
            _ => {}
        }
    }

    Ok((form, document))
}

fn attachment_headers(content_type: &str, filename: &str) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?,
    );
    Ok(headers)
}

/// POST /applications (multipart)
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    let (form, document) = read_multipart(mp).await?;
    let receipt = services::submit_application(&state, form, document).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    Path(application_id): Path<String>,
) -> Result<Json<StatusView>, AppError> {
    let application = services::check_status(&state, &application_id).await?;
    Ok(Json(application.into()))
}

#[instrument(skip_all)]
pub async fn portal(
    State(state): State<AppState>,
    StudentSession(session): StudentSession,
) -> Result<Json<PortalView>, AppError> {
    let application = services::get_application(&state, &session.subject).await?;
    Ok(Json(application.into()))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    StudentSession(session): StudentSession,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<PortalView>, AppError> {
    let application = services::update_profile(&state, &session.subject, payload).await?;
    Ok(Json(application.into()))
}

/// POST /student/documents (multipart, field `documents`)
#[instrument(skip_all)]
pub async fn resubmit_document(
    State(state): State<AppState>,
    StudentSession(session): StudentSession,
    mp: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let (_, document) = read_multipart(mp).await?;
    Ok(Json(
        services::resubmit_document(&state, &session.subject, document).await?,
    ))
}

#[instrument(skip(state, _admin))]
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminSession,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApplicationList>, AppError> {
    Ok(Json(services::list_applications(&state, query).await?))
}

#[instrument(skip_all)]
pub async fn courses(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(Application::distinct_courses(&state.db).await?))
}

#[instrument(skip(state, _admin))]
pub async fn detail(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(application_id): Path<String>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(services::get_application(&state, &application_id).await?))
}

#[instrument(skip(state, admin, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(application_id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let AdminSession(session) = admin;
    tracing::debug!(admin = %session.subject, "status update requested");
    Ok(Json(
        services::update_status(&state, &application_id, &payload.status, payload.admin_notes)
            .await?,
    ))
}

#[instrument(skip(state, _admin, payload))]
pub async fn update_document_status(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(application_id): Path<String>,
    Json(payload): Json<DocumentStatusRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    Ok(Json(
        services::update_document_status(
            &state,
            &application_id,
            &payload.document_status,
            payload.document_notes,
        )
        .await?,
    ))
}

#[instrument(skip(state, _admin, payload))]
pub async fn bulk_status(
    State(state): State<AppState>,
    _admin: AdminSession,
    Json(payload): Json<BulkStatusRequest>,
) -> Result<Json<BulkStatusResponse>, AppError> {
    Ok(Json(
        services::bulk_update_status(
            &state,
            &payload.application_ids,
            &payload.status,
            payload.admin_notes,
        )
        .await?,
    ))
}

#[instrument(skip(state, _admin))]
pub async fn download_document(
    State(state): State<AppState>,
    _admin: AdminSession,
    Path(application_id): Path<String>,
) -> Result<(HeaderMap, Bytes), AppError> {
    let (key, body) = services::load_document(&state, &application_id).await?;
    let headers = attachment_headers(content_type_for(&key), &key)?;
    Ok((headers, body))
}

#[instrument(skip_all)]
pub async fn export_csv(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<(HeaderMap, Vec<u8>), AppError> {
    let body = export::export_applications(&state).await?;
    let filename = export::export_filename(services::now_utc())?;
    let headers = attachment_headers("text/csv", &filename)?;
    Ok((headers, body))
}
