use serde::Serialize;
use time::Date;

use crate::applications::repo_types::iso_date;

/// Application counts by status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseStats {
    pub course: String,
    pub total: i64,
    pub accepted: i64,
    pub acceptance_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyStats {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub total: i64,
    pub accepted: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrendPoint {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsReport {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub acceptance_rate: f64,
    pub today_applications: i64,
    pub courses: Vec<CourseStats>,
    /// Newest day first.
    pub daily: Vec<DailyStats>,
    /// Oldest day first.
    pub trend: Vec<TrendPoint>,
}
