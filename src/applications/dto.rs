use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::repo_types::{iso_date, Application, ApplicationStatus, DocumentStatus};

/// Raw application form fields as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub previous_education: String,
}

/// A file taken out of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub application_id: String,
    pub email_sent: bool,
    pub message: String,
}

/// What the public status check reveals.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub application_id: String,
    pub name: String,
    pub course: String,
    pub status: ApplicationStatus,
    pub document_status: DocumentStatus,
    pub admin_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Application> for StatusView {
    fn from(a: Application) -> Self {
        Self {
            application_id: a.application_id,
            name: a.name,
            course: a.course,
            status: a.status,
            document_status: a.document_status,
            admin_notes: a.admin_notes,
            created_at: a.created_at,
        }
    }
}

/// Student portal view of their own application.
#[derive(Debug, Serialize)]
pub struct PortalView {
    pub application_id: String,
    pub name: String,
    #[serde(with = "iso_date")]
    pub dob: Date,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub course: String,
    pub previous_education: String,
    pub has_document: bool,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub document_status: DocumentStatus,
    pub document_notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Application> for PortalView {
    fn from(a: Application) -> Self {
        Self {
            application_id: a.application_id,
            name: a.name,
            dob: a.dob,
            gender: a.gender,
            email: a.email,
            phone: a.phone,
            address: a.address,
            course: a.course,
            previous_education: a.previous_education,
            has_document: a.documents_path.is_some(),
            status: a.status,
            admin_notes: a.admin_notes,
            document_status: a.document_status,
            document_notes: a.document_notes,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    #[serde(default)]
    pub application_ids: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BulkStatusResponse {
    pub requested: usize,
    pub updated: u64,
    pub status: ApplicationStatus,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentStatusRequest {
    pub document_status: String,
    #[serde(default)]
    pub document_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationList {
    pub applications: Vec<Application>,
    pub courses: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
