use anyhow::Context;
use sqlx::SqliteConnection;
use time::{macros::format_description, Date};

pub const ID_PREFIX: &str = "ADM";

/// `ADM` followed by the date as `YYYYMMDD`.
pub fn daily_prefix(day: Date) -> String {
    format!(
        "{ID_PREFIX}{:04}{:02}{:02}",
        day.year(),
        u8::from(day.month()),
        day.day()
    )
}

pub fn format_application_id(day: Date, sequence: i64) -> String {
    format!("{}{:03}", daily_prefix(day), sequence)
}

/// Checks the `ADM` + 8 digit date + 3+ digit sequence shape.
pub fn is_well_formed(id: &str) -> bool {
    let Some(rest) = id.strip_prefix(ID_PREFIX) else {
        return false;
    };
    rest.len() >= 11
        && rest.bytes().all(|b| b.is_ascii_digit())
        && Date::parse(&rest[..8], format_description!("[year][month][day]")).is_ok()
}

/// Hands out the next application ID for `day`.
///
/// The per-day counter is seeded from the number of applications already
/// carrying that day's prefix and then bumped with a single upsert, so two
/// submissions racing on the same day serialise on the row instead of
/// reading the same count. Call it inside the transaction that inserts the
/// application so a failed insert gives the number back.
pub async fn next_application_id(conn: &mut SqliteConnection, day: Date) -> anyhow::Result<String> {
    let prefix = daily_prefix(day);
    let day_key = day
        .format(format_description!("[year]-[month]-[day]"))
        .context("format sequence day")?;

    let (sequence,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO application_sequences (day, last_value)
        VALUES (?, (SELECT COUNT(*) FROM students WHERE application_id LIKE ?) + 1)
        ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(&day_key)
    .bind(format!("{prefix}%"))
    .fetch_one(&mut *conn)
    .await
    .context("advance daily application sequence")?;

    Ok(format_application_id(day, sequence))
}
