use time::{Date, Duration};
use tracing::debug;

use super::dto::{AnalyticsReport, CourseStats, DailyStats, StatusCounts, TrendPoint};
use super::repo;
use crate::error::AppError;
use crate::state::AppState;

pub const DAILY_WINDOW_DAYS: i64 = 7;
pub const TREND_WINDOW_DAYS: i64 = 30;

/// Percentage of `accepted` in `total`, one decimal place. Zero when there is nothing to rate.
pub fn acceptance_rate(accepted: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (accepted as f64 * 1000.0 / total as f64).round() / 10.0
}

pub async fn dashboard(state: &AppState) -> Result<StatusCounts, AppError> {
    Ok(repo::count_by_status(&state.db).await?)
}

/// Builds the full report relative to `today` (UTC).
pub async fn analytics_report(state: &AppState, today: Date) -> Result<AnalyticsReport, AppError> {
    let counts = repo::count_by_status(&state.db).await?;
    let today_applications = repo::count_created_on(&state.db, today).await?;

    let courses = repo::course_breakdown(&state.db)
        .await?
        .into_iter()
        .map(|row| CourseStats {
            acceptance_rate: acceptance_rate(row.accepted, row.total),
            course: row.course,
            total: row.total,
            accepted: row.accepted,
        })
        .collect();

    let daily = repo::daily_breakdown(&state.db, today - Duration::days(DAILY_WINDOW_DAYS))
        .await?
        .into_iter()
        .map(|row| {
            Ok(DailyStats {
                date: repo::parse_day(&row.day)?,
                total: row.total,
                accepted: row.accepted,
                rejected: row.rejected,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let trend = repo::submission_trend(&state.db, today - Duration::days(TREND_WINDOW_DAYS))
        .await?
        .into_iter()
        .map(|row| {
            Ok(TrendPoint {
                date: repo::parse_day(&row.day)?,
                count: row.count,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    debug!(total = counts.total, %today, "analytics computed");
    Ok(AnalyticsReport {
        acceptance_rate: acceptance_rate(counts.accepted, counts.total),
        counts,
        today_applications,
        courses,
        daily,
        trend,
    })
}
