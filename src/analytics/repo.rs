use anyhow::Context;
use sqlx::{FromRow, SqlitePool};
use time::{macros::format_description, Date};

use super::dto::StatusCounts;

#[derive(Debug, FromRow)]
pub struct CourseRow {
    pub course: String,
    pub total: i64,
    pub accepted: i64,
}

#[derive(Debug, FromRow)]
pub struct DailyRow {
    pub day: String,
    pub total: i64,
    pub accepted: i64,
    pub rejected: i64,
}

#[derive(Debug, FromRow)]
pub struct TrendRow {
    pub day: String,
    pub count: i64,
}

fn day_string(day: Date) -> anyhow::Result<String> {
    day.format(format_description!("[year]-[month]-[day]"))
        .context("format day")
}

/// Parses the `DATE(...)` text SQLite hands back.
pub fn parse_day(raw: &str) -> anyhow::Result<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("parse day {raw:?}"))
}

pub async fn count_by_status(db: &SqlitePool) -> anyhow::Result<StatusCounts> {
    let (total, pending, accepted, rejected): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN status = 'Pending' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN status = 'Accepted' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN status = 'Rejected' THEN 1 ELSE 0 END), 0)
        FROM students
        "#,
    )
    .fetch_one(db)
    .await
    .context("count applications by status")?;

    Ok(StatusCounts {
        total,
        pending,
        accepted,
        rejected,
    })
}

pub async fn count_created_on(db: &SqlitePool, day: Date) -> anyhow::Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM students WHERE DATE(created_at) = ?")
            .bind(day_string(day)?)
            .fetch_one(db)
            .await
            .context("count applications created on day")?;
    Ok(count)
}

/// Per-course totals, busiest course first.
pub async fn course_breakdown(db: &SqlitePool) -> anyhow::Result<Vec<CourseRow>> {
    sqlx::query_as::<_, CourseRow>(
        r#"
        SELECT course,
               COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN status = 'Accepted' THEN 1 ELSE 0 END), 0) AS accepted
        FROM students
        GROUP BY course
        ORDER BY total DESC, course ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("course breakdown")
}

/// Days on or after `since` that have submissions, newest first.
pub async fn daily_breakdown(db: &SqlitePool, since: Date) -> anyhow::Result<Vec<DailyRow>> {
    sqlx::query_as::<_, DailyRow>(
        r#"
        SELECT DATE(created_at) AS day,
               COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN status = 'Accepted' THEN 1 ELSE 0 END), 0) AS accepted,
               COALESCE(SUM(CASE WHEN status = 'Rejected' THEN 1 ELSE 0 END), 0) AS rejected
        FROM students
        WHERE DATE(created_at) >= ?
        GROUP BY DATE(created_at)
        ORDER BY DATE(created_at) DESC
        "#,
    )
    .bind(day_string(since)?)
    .fetch_all(db)
    .await
    .context("daily breakdown")
}

/// Submission counts per day on or after `since`, oldest first.
pub async fn submission_trend(db: &SqlitePool, since: Date) -> anyhow::Result<Vec<TrendRow>> {
    sqlx::query_as::<_, TrendRow>(
        r#"
        SELECT DATE(created_at) AS day, COUNT(*) AS count
        FROM students
        WHERE DATE(created_at) >= ?
        GROUP BY DATE(created_at)
        ORDER BY DATE(created_at) ASC
        "#,
    )
    .bind(day_string(since)?)
    .fetch_all(db)
    .await
    .context("submission trend")
}
