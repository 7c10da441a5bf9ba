use std::collections::BTreeSet;

use anyhow::Context;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::{info, warn};

use super::dto::{
    ApplicationForm, ApplicationList, BulkStatusResponse, ListQuery, MessageResponse,
    ProfileUpdateRequest, SubmissionReceipt, UploadedDocument,
};
use super::id;
use super::repo_types::{
    Application, ApplicationFilter, ApplicationStatus, ContactUpdate, DocumentStatus,
    NewApplication,
};
use crate::error::AppError;
use crate::state::AppState;
use crate::storage;

const DUPLICATE_EMAIL: &str = "An application with this email already exists!";
const NOT_FOUND: &str = "Application not found!";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Current UTC time truncated to whole seconds, the precision rows are stored at.
pub(crate) fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

pub fn normalize_application_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn is_email_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|e| e.is_unique_violation() && e.message().contains("email"))
        .unwrap_or(false)
}

pub(crate) fn validate_form(form: ApplicationForm) -> Result<NewApplication, AppError> {
    let name = form.name.trim().to_string();
    let dob = form.dob.trim().to_string();
    let gender = form.gender.trim().to_string();
    let email = normalize_email(&form.email);
    let phone = form.phone.trim().to_string();
    let address = form.address.trim().to_string();
    let course = form.course.trim().to_string();
    let previous_education = form.previous_education.trim().to_string();

    let required = [
        &name,
        &dob,
        &gender,
        &email,
        &phone,
        &address,
        &course,
        &previous_education,
    ];
    if required.iter().any(|v| v.is_empty()) {
        return Err(AppError::validation("All fields are required!"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email address!"));
    }
    let dob = Date::parse(&dob, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::validation("Invalid date of birth!"))?;

    Ok(NewApplication {
        name,
        dob,
        gender,
        email,
        phone,
        address,
        course,
        previous_education,
        documents_path: None,
    })
}

fn ensure_size(state: &AppState, doc: &UploadedDocument) -> Result<(), AppError> {
    let max = state.config.uploads.max_bytes;
    if doc.body.len() > max {
        return Err(AppError::validation(format!(
            "File is too large! Maximum size is {} MB.",
            max / (1024 * 1024)
        )));
    }
    Ok(())
}

async fn store_document(
    state: &AppState,
    doc: UploadedDocument,
    now: OffsetDateTime,
) -> Result<String, AppError> {
    let key = storage::document_key(now, &doc.filename)?;
    let content_type = if doc.content_type.is_empty() {
        storage::content_type_for(&key)
    } else {
        doc.content_type.as_str()
    };
    state
        .storage
        .put_object(&key, doc.body.clone(), content_type)
        .await
        .with_context(|| format!("store document {key}"))?;
    Ok(key)
}

async fn insert_with_new_id(
    state: &AppState,
    new: &NewApplication,
    now: OffsetDateTime,
) -> Result<Application, AppError> {
    let mut tx = state.db.begin().await.context("begin submission")?;
    let application_id = id::next_application_id(&mut tx, now.date()).await?;
    let application = Application::insert(&mut tx, new, &application_id, now)
        .await
        .map_err(|e| {
            if is_email_conflict(&e) {
                AppError::conflict(DUPLICATE_EMAIL)
            } else {
                AppError::from(e)
            }
        })?;
    tx.commit().await.context("commit submission")?;
    Ok(application)
}

pub async fn submit_application(
    state: &AppState,
    form: ApplicationForm,
    document: Option<UploadedDocument>,
) -> Result<SubmissionReceipt, AppError> {
    submit_application_at(state, form, document, now_utc()).await
}

/// Records a new application, then sends the confirmation email.
/// A failed email is reported in the receipt, never as an error.
pub async fn submit_application_at(
    state: &AppState,
    form: ApplicationForm,
    document: Option<UploadedDocument>,
    now: OffsetDateTime,
) -> Result<SubmissionReceipt, AppError> {
    let mut new = validate_form(form)?;

    if Application::email_exists(&state.db, &new.email).await? {
        warn!(email = %new.email, "duplicate application email");
        return Err(AppError::conflict(DUPLICATE_EMAIL));
    }

    if let Some(doc) = document.filter(|d| !d.filename.is_empty()) {
        if storage::allowed_file(&doc.filename) {
            ensure_size(state, &doc)?;
            new.documents_path = Some(store_document(state, doc, now).await?);
        } else {
            warn!(filename = %doc.filename, "ignoring document with disallowed extension");
        }
    }

    let application = match insert_with_new_id(state, &new, now).await {
        Ok(a) => a,
        Err(e) => {
            if let Some(key) = &new.documents_path {
                if let Err(cleanup) = state.storage.delete_object(key).await {
                    warn!(error = %cleanup, %key, "failed to remove orphaned document");
                }
            }
            return Err(e);
        }
    };
    info!(
        application_id = %application.application_id,
        email = %application.email,
        course = %application.course,
        "application submitted"
    );

    let email_sent = match state
        .notifier
        .send_confirmation(&application.email, &application.application_id, &application.name)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, application_id = %application.application_id, "confirmation email failed");
            false
        }
    };

    let message = if email_sent {
        format!(
            "Application submitted successfully! Your Application ID is {}. Check your email for confirmation.",
            application.application_id
        )
    } else {
        format!(
            "Application submitted successfully! Your Application ID is {}. (Email notification failed)",
            application.application_id
        )
    };

    Ok(SubmissionReceipt {
        application_id: application.application_id,
        email_sent,
        message,
    })
}

pub async fn check_status(state: &AppState, raw_id: &str) -> Result<Application, AppError> {
    let application_id = normalize_application_id(raw_id);
    if !id::is_well_formed(&application_id) {
        return Err(AppError::not_found("Application ID not found!"));
    }
    Application::find_by_application_id(&state.db, &application_id)
        .await?
        .ok_or_else(|| AppError::not_found("Application ID not found!"))
}

pub async fn get_application(state: &AppState, application_id: &str) -> Result<Application, AppError> {
    let application_id = normalize_application_id(application_id);
    Application::find_by_application_id(&state.db, &application_id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))
}

pub async fn update_profile(
    state: &AppState,
    application_id: &str,
    req: ProfileUpdateRequest,
) -> Result<Application, AppError> {
    let contact = ContactUpdate {
        email: normalize_email(&req.email),
        phone: req.phone.trim().to_string(),
        address: req.address.trim().to_string(),
    };
    if contact.email.is_empty() || contact.phone.is_empty() || contact.address.is_empty() {
        return Err(AppError::validation("All fields are required!"));
    }
    if !is_valid_email(&contact.email) {
        return Err(AppError::validation("Invalid email address!"));
    }

    let updated = Application::update_contact(&state.db, application_id, &contact)
        .await
        .map_err(|e| {
            if is_email_conflict(&e) {
                AppError::conflict("This email is already used by another application!")
            } else {
                AppError::from(e)
            }
        })?;
    if updated == 0 {
        return Err(AppError::not_found(NOT_FOUND));
    }
    info!(%application_id, "profile updated");
    get_application(state, application_id).await
}

pub async fn resubmit_document(
    state: &AppState,
    application_id: &str,
    document: Option<UploadedDocument>,
) -> Result<MessageResponse, AppError> {
    let doc = document.ok_or_else(|| AppError::validation("No file uploaded!"))?;
    if doc.filename.is_empty() {
        return Err(AppError::validation("No file selected!"));
    }
    if !storage::allowed_file(&doc.filename) {
        return Err(AppError::validation("Invalid file type!"));
    }
    ensure_size(state, &doc)?;
    get_application(state, application_id).await?;

    let key = store_document(state, doc, now_utc()).await?;
    Application::replace_document(&state.db, application_id, &key).await?;
    info!(%application_id, %key, "document resubmitted; verification reset");

    Ok(MessageResponse::new(
        "Documents resubmitted successfully! Verification status has been reset to Pending.",
    ))
}

pub async fn update_status(
    state: &AppState,
    application_id: &str,
    raw_status: &str,
    admin_notes: Option<String>,
) -> Result<MessageResponse, AppError> {
    let status: ApplicationStatus = raw_status
        .parse()
        .map_err(|_| AppError::validation("Invalid application status!"))?;
    let notes = clean_notes(admin_notes);
    let application_id = normalize_application_id(application_id);

    let updated =
        Application::update_status(&state.db, &application_id, status, notes.as_deref()).await?;
    if updated == 0 {
        return Err(AppError::not_found(NOT_FOUND));
    }
    info!(%application_id, %status, "application status updated");
    Ok(MessageResponse::new("Application status updated successfully!"))
}

/// Applies one status to every listed ID. Rows are updated independently;
/// IDs that match nothing are skipped and simply not counted. Repeated IDs
/// are requested once.
pub async fn bulk_update_status(
    state: &AppState,
    application_ids: &[String],
    raw_status: &str,
    admin_notes: Option<String>,
) -> Result<BulkStatusResponse, AppError> {
    let targets: BTreeSet<String> = application_ids
        .iter()
        .map(|id| normalize_application_id(id))
        .filter(|id| !id.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(AppError::validation("No applications selected!"));
    }
    let status: ApplicationStatus = raw_status
        .parse()
        .map_err(|_| AppError::validation("Invalid application status!"))?;
    let notes = clean_notes(admin_notes);

    let mut updated = 0;
    for application_id in &targets {
        updated +=
            Application::update_status(&state.db, application_id, status, notes.as_deref())
                .await?;
    }
    info!(requested = targets.len(), updated, %status, "bulk status update");

    Ok(BulkStatusResponse {
        requested: targets.len(),
        updated,
        status,
        message: format!("Successfully updated {updated} application(s) to {status}!"),
    })
}

pub async fn update_document_status(
    state: &AppState,
    application_id: &str,
    raw_status: &str,
    document_notes: Option<String>,
) -> Result<MessageResponse, AppError> {
    let status: DocumentStatus = raw_status
        .parse()
        .map_err(|_| AppError::validation("Invalid document status!"))?;

    let application = get_application(state, application_id).await?;
    if application.documents_path.is_none() {
        return Err(AppError::validation("No documents uploaded for this application!"));
    }
    let application_id = application.application_id;

    let notes = clean_notes(document_notes);
    let updated =
        Application::update_document_status(&state.db, &application_id, status, notes.as_deref())
            .await?;
    if updated == 0 {
        return Err(AppError::not_found(NOT_FOUND));
    }
    info!(%application_id, %status, "document status updated");
    Ok(MessageResponse::new(format!("Document status updated to {status}!")))
}

pub(crate) fn filter_from_query(query: ListQuery) -> Result<ApplicationFilter, AppError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<ApplicationStatus>()
                .map_err(|_| AppError::validation("Invalid application status!"))?,
        ),
    };
    Ok(ApplicationFilter {
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        status,
        course: query.course.filter(|c| !c.is_empty()),
    })
}

pub async fn list_applications(state: &AppState, query: ListQuery) -> Result<ApplicationList, AppError> {
    let filter = filter_from_query(query)?;
    let applications = Application::list(&state.db, &filter).await?;
    let courses = Application::distinct_courses(&state.db).await?;
    Ok(ApplicationList {
        total: applications.len(),
        applications,
        courses,
    })
}

pub async fn load_document(state: &AppState, application_id: &str) -> Result<(String, Bytes), AppError> {
    let application = get_application(state, application_id).await?;
    let key = application
        .documents_path
        .ok_or_else(|| AppError::not_found("No documents uploaded for this application!"))?;
    let body = state.storage.get_object(&key).await?;
    Ok((key, body))
}
