use anyhow::Context;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use time::OffsetDateTime;

use super::repo_types::{
    Application, ApplicationFilter, ApplicationStatus, ContactUpdate, DocumentStatus,
    NewApplication,
};

const COLUMNS: &str = "id, name, dob, gender, email, phone, address, course, previous_education, \
    documents_path, status, application_id, created_at, admin_notes, document_status, document_notes";

impl Application {
    /// Inserts a new row with `Pending` statuses.
    ///
    /// Returns the raw `sqlx::Error` so callers can tell a duplicate email
    /// (unique violation) apart from other failures.
    pub async fn insert(
        conn: &mut SqliteConnection,
        new: &NewApplication,
        application_id: &str,
        created_at: OffsetDateTime,
    ) -> sqlx::Result<Application> {
        sqlx::query_as::<_, Application>(&format!(
            r#"
            INSERT INTO students (name, dob, gender, email, phone, address, course,
                                  previous_education, documents_path, status, application_id,
                                  created_at, document_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(new.dob)
        .bind(&new.gender)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.address)
        .bind(&new.course)
        .bind(&new.previous_education)
        .bind(&new.documents_path)
        .bind(ApplicationStatus::Pending)
        .bind(application_id)
        .bind(created_at)
        .bind(DocumentStatus::Pending)
        .fetch_one(&mut *conn)
        .await
    }

    pub async fn find_by_application_id(
        db: &SqlitePool,
        application_id: &str,
    ) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, Application>(&format!(
            "SELECT {COLUMNS} FROM students WHERE application_id = ?"
        ))
        .bind(application_id)
        .fetch_optional(db)
        .await
        .context("find application by id")?;
        Ok(row)
    }

    /// Login check: both values must belong to the same row.
    pub async fn find_by_application_id_and_email(
        db: &SqlitePool,
        application_id: &str,
        email: &str,
    ) -> anyhow::Result<Option<Application>> {
        let row = sqlx::query_as::<_, Application>(&format!(
            "SELECT {COLUMNS} FROM students WHERE application_id = ? AND email = ?"
        ))
        .bind(application_id)
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find application by id and email")?;
        Ok(row)
    }

    pub async fn email_exists(db: &SqlitePool, email: &str) -> anyhow::Result<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM students WHERE email = ?")
            .bind(email)
            .fetch_optional(db)
            .await
            .context("check email")?;
        Ok(found.is_some())
    }

    pub async fn update_contact(
        db: &SqlitePool,
        application_id: &str,
        contact: &ContactUpdate,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE students SET email = ?, phone = ?, address = ? WHERE application_id = ?",
        )
        .bind(&contact.email)
        .bind(&contact.phone)
        .bind(&contact.address)
        .bind(application_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_status(
        db: &SqlitePool,
        application_id: &str,
        status: ApplicationStatus,
        admin_notes: Option<&str>,
    ) -> anyhow::Result<u64> {
        let result =
            sqlx::query("UPDATE students SET status = ?, admin_notes = ? WHERE application_id = ?")
                .bind(status)
                .bind(admin_notes)
                .bind(application_id)
                .execute(db)
                .await
                .context("update status")?;
        Ok(result.rows_affected())
    }

    pub async fn update_document_status(
        db: &SqlitePool,
        application_id: &str,
        status: DocumentStatus,
        notes: Option<&str>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE students SET document_status = ?, document_notes = ? WHERE application_id = ?",
        )
        .bind(status)
        .bind(notes)
        .bind(application_id)
        .execute(db)
        .await
        .context("update document status")?;
        Ok(result.rows_affected())
    }

    /// Points the row at a new document and puts verification back to `Pending`.
    pub async fn replace_document(
        db: &SqlitePool,
        application_id: &str,
        documents_path: &str,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE students
               SET documents_path = ?, document_status = ?, document_notes = NULL
             WHERE application_id = ?
            "#,
        )
        .bind(documents_path)
        .bind(DocumentStatus::Pending)
        .bind(application_id)
        .execute(db)
        .await
        .context("replace document")?;
        Ok(result.rows_affected())
    }

    /// Newest first.
    pub async fn list(db: &SqlitePool, filter: &ApplicationFilter) -> anyhow::Result<Vec<Application>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM students"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb
            .build_query_as::<Application>()
            .fetch_all(db)
            .await
            .context("list applications")?;
        Ok(rows)
    }

    pub async fn distinct_courses(db: &SqlitePool) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT course FROM students ORDER BY course")
                .fetch_all(db)
                .await
                .context("list courses")?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }
}

/// Appends the filter as bound predicates joined with AND.
pub fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ApplicationFilter) {
    let mut sep = " WHERE ";

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(sep)
            .push("(name LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR application_id LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
        sep = " AND ";
    }

    if let Some(status) = filter.status {
        qb.push(sep).push("status = ").push_bind(status);
        sep = " AND ";
    }

    if let Some(course) = filter.course.as_deref().filter(|c| !c.is_empty()) {
        qb.push(sep).push("course = ").push_bind(course.to_string());
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{memory_pool, new_application};
    use time::macros::datetime;

    async fn seed(pool: &SqlitePool, name: &str, email: &str, course: &str, id: &str, at: OffsetDateTime) {
        let mut conn = pool.acquire().await.unwrap();
        let mut new = new_application(email);
        new.name = name.to_string();
        new.course = course.to_string();
        Application::insert(&mut conn, &new, id, at).await.unwrap();
    }

    #[test]
    fn filter_builds_bound_predicates() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM students");
        push_filter(
            &mut qb,
            &ApplicationFilter {
                search: Some("ann".into()),
                status: Some(ApplicationStatus::Accepted),
                course: Some("Physics".into()),
            },
        );
        assert_eq!(
            qb.sql(),
            "SELECT id FROM students WHERE (name LIKE ? ESCAPE '\\' OR application_id LIKE ? ESCAPE '\\') AND status = ? AND course = ?"
        );
    }

    #[test]
    fn empty_filter_adds_nothing() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM students");
        push_filter(
            &mut qb,
            &ApplicationFilter {
                search: Some("   ".into()),
                status: None,
                course: Some(String::new()),
            },
        );
        assert_eq!(qb.sql(), "SELECT id FROM students");
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let pool = memory_pool().await;
        let at = datetime!(2025-10-06 09:00:00 UTC);
        seed(&pool, "Ann", "a@x.com", "Physics", "ADM20251006001", at).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = Application::insert(&mut conn, &new_application("a@x.com"), "ADM20251006002", at)
            .await
            .unwrap_err();
        let is_unique = err
            .as_database_error()
            .map(|e| e.is_unique_violation())
            .unwrap_or(false);
        assert!(is_unique);
    }

    #[tokio::test]
    async fn list_searches_filters_and_sorts_newest_first() {
        let pool = memory_pool().await;
        seed(&pool, "Ann Lee", "a@x.com", "Physics", "ADM20251006001", datetime!(2025-10-06 09:00:00 UTC)).await;
        seed(&pool, "Bob Ray", "b@x.com", "Physics", "ADM20251006002", datetime!(2025-10-06 10:00:00 UTC)).await;
        seed(&pool, "Joann Kim", "c@x.com", "History", "ADM20251007001", datetime!(2025-10-07 08:00:00 UTC)).await;

        let all = Application::list(&pool, &ApplicationFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|a| a.application_id.as_str()).collect();
        assert_eq!(ids, ["ADM20251007001", "ADM20251006002", "ADM20251006001"]);

        let by_name = Application::list(
            &pool,
            &ApplicationFilter { search: Some("ANN".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(by_name.len(), 2);

        let by_id = Application::list(
            &pool,
            &ApplicationFilter { search: Some("20251006".into()), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(by_id.len(), 2);

        let composed = Application::list(
            &pool,
            &ApplicationFilter {
                search: Some("ann".into()),
                status: Some(ApplicationStatus::Pending),
                course: Some("History".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(composed.len(), 1);
        assert_eq!(composed[0].name, "Joann Kim");

        let accepted = Application::list(
            &pool,
            &ApplicationFilter { status: Some(ApplicationStatus::Accepted), ..Default::default() },
        )
        .await
        .unwrap();
        assert!(accepted.is_empty());
    }

    #[tokio::test]
    async fn courses_are_distinct_and_sorted() {
        let pool = memory_pool().await;
        let at = datetime!(2025-10-06 09:00:00 UTC);
        seed(&pool, "A", "a@x.com", "Physics", "ADM20251006001", at).await;
        seed(&pool, "B", "b@x.com", "History", "ADM20251006002", at).await;
        seed(&pool, "C", "c@x.com", "Physics", "ADM20251006003", at).await;

        assert_eq!(Application::distinct_courses(&pool).await.unwrap(), ["History", "Physics"]);
    }

    #[tokio::test]
    async fn replace_document_resets_verification() {
        let pool = memory_pool().await;
        seed(&pool, "A", "a@x.com", "Physics", "ADM20251006001", datetime!(2025-10-06 09:00:00 UTC)).await;
        Application::update_document_status(&pool, "ADM20251006001", DocumentStatus::Rejected, Some("blurry"))
            .await
            .unwrap();

        let n = Application::replace_document(&pool, "ADM20251006001", "20251006_100000_new.pdf")
            .await
            .unwrap();
        assert_eq!(n, 1);

        let row = Application::find_by_application_id(&pool, "ADM20251006001")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.document_status, DocumentStatus::Pending);
        assert_eq!(row.document_notes, None);
        assert_eq!(row.documents_path.as_deref(), Some("20251006_100000_new.pdf"));
    }

    #[tokio::test]
    async fn login_lookup_requires_matching_email() {
        let pool = memory_pool().await;
        seed(&pool, "A", "a@x.com", "Physics", "ADM20251006001", datetime!(2025-10-06 09:00:00 UTC)).await;

        assert!(Application::find_by_application_id_and_email(&pool, "ADM20251006001", "a@x.com")
            .await
            .unwrap()
            .is_some());
        assert!(Application::find_by_application_id_and_email(&pool, "ADM20251006001", "b@x.com")
            .await
            .unwrap()
            .is_none());
    }
}
