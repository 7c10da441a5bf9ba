use std::io::Write;

use anyhow::Context;
use time::{macros::format_description, OffsetDateTime};

use super::repo_types::{Application, ApplicationFilter};
use crate::state::AppState;

pub const CSV_HEADER: [&str; 13] = [
    "ID",
    "Name",
    "Date of Birth",
    "Gender",
    "Email",
    "Phone",
    "Address",
    "Course",
    "Previous Education",
    "Status",
    "Application ID",
    "Created At",
    "Admin Notes",
];

pub fn export_filename(now: OffsetDateTime) -> anyhow::Result<String> {
    let stamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .context("format export timestamp")?;
    Ok(format!("applications_{stamp}.csv"))
}

fn record(a: &Application) -> anyhow::Result<[String; 13]> {
    Ok([
        a.id.to_string(),
        a.name.clone(),
        a.dob
            .format(format_description!("[year]-[month]-[day]"))
            .context("format dob")?,
        a.gender.clone(),
        a.email.clone(),
        a.phone.clone(),
        a.address.clone(),
        a.course.clone(),
        a.previous_education.clone(),
        a.status.to_string(),
        a.application_id.clone(),
        a.created_at
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .context("format created_at")?,
        a.admin_notes.clone().unwrap_or_default(),
    ])
}

pub fn write_csv<W: Write>(applications: &[Application], out: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER).context("write csv header")?;
    for a in applications {
        writer.write_record(record(a)?).context("write csv row")?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}

/// Every application, newest first, as CSV bytes.
pub async fn export_applications(state: &AppState) -> anyhow::Result<Vec<u8>> {
    let applications = Application::list(&state.db, &ApplicationFilter::default()).await?;
    let mut buf = Vec::new();
    write_csv(&applications, &mut buf)?;
    tracing::info!(rows = applications.len(), "applications exported");
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::repo_types::{ApplicationStatus, DocumentStatus};
    use time::macros::{date, datetime};

    fn application(id: i64, name: &str, notes: Option<&str>) -> Application {
        Application {
            id,
            name: name.into(),
            dob: date!(2005 - 04 - 01),
            gender: "Female".into(),
            email: format!("{id}@x.com"),
            phone: "555".into(),
            address: "1 Road, Town".into(),
            course: "Physics".into(),
            previous_education: "HS".into(),
            documents_path: Some("doc.pdf".into()),
            status: ApplicationStatus::Accepted,
            application_id: format!("ADM20251006{id:03}"),
            created_at: datetime!(2025-10-06 09:30:00 UTC),
            admin_notes: notes.map(str::to_string),
            document_status: DocumentStatus::Verified,
            document_notes: Some("fine".into()),
        }
    }

    #[test]
    fn writes_fixed_header_and_thirteen_columns() {
        let mut buf = Vec::new();
        write_csv(
            &[application(2, "Bo", None), application(1, "Ann", Some("great fit"))],
            &mut buf,
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(
            lines[0],
            "ID,Name,Date of Birth,Gender,Email,Phone,Address,Course,Previous Education,Status,Application ID,Created At,Admin Notes"
        );
        assert_eq!(
            lines[1],
            "2,Bo,2005-04-01,Female,2@x.com,555,\"1 Road, Town\",Physics,HS,Accepted,ADM20251006002,2025-10-06 09:30:00,"
        );
        assert!(lines[2].ends_with(",great fit"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn filename_carries_timestamp() {
        let name = export_filename(datetime!(2025-10-06 17:04:09 UTC)).unwrap();
        assert_eq!(name, "applications_20251006_170409.csv");
    }
}
