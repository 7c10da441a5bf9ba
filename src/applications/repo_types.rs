use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

time::serde::format_description!(pub(crate) iso_date, Date, "[year]-[month]-[day]");

/// Overall decision on an application. Any value may be set by an admin at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Verification state of the uploaded supporting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum DocumentStatus {
    Pending,
    Verified,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Rejected => "Rejected",
        }
    }
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Verified => "Verified",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status {:?}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" => Ok(Self::Pending),
            "Accepted" => Ok(Self::Accepted),
            "Rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" => Ok(Self::Pending),
            "Verified" => Ok(Self::Verified),
            "Rejected" => Ok(Self::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One row of the `students` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Application {
    pub id: i64,
    pub name: String,
    #[serde(with = "iso_date")]
    pub dob: Date,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub course: String,
    pub previous_education: String,
    pub documents_path: Option<String>,
    pub status: ApplicationStatus,
    pub application_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub admin_notes: Option<String>,
    pub document_status: DocumentStatus,
    pub document_notes: Option<String>,
}

/// Validated fields for an insert; ID and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub name: String,
    pub dob: Date,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub course: String,
    pub previous_education: String,
    pub documents_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactUpdate {
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Predicates for the admin listing; all present predicates must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub search: Option<String>,
    pub status: Option<ApplicationStatus>,
    pub course: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_parse_from_their_display_form() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
        ] {
            assert_eq!(status.to_string().parse::<ApplicationStatus>().unwrap(), status);
        }
        assert_eq!("Verified".parse::<DocumentStatus>().unwrap(), DocumentStatus::Verified);
        assert!("verified".parse::<DocumentStatus>().is_err());
        assert!("Approved".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn statuses_serialize_as_plain_names() {
        assert_eq!(
            serde_json::to_string(&ApplicationStatus::Accepted).unwrap(),
            "\"Accepted\""
        );
        assert_eq!(
            serde_json::to_string(&DocumentStatus::Pending).unwrap(),
            "\"Pending\""
        );
    }
}
