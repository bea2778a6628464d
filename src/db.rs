use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{CheckOutcome, MatchKind};

const UPSERT_CHECK: &str = r#"
    INSERT INTO kq_checker.checks
    (id, source_key, course, event_at, room, matched, match_kind,
     candidates, checked_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    ON CONFLICT (source_key) DO UPDATE
    SET room = EXCLUDED.room,
        matched = EXCLUDED.matched,
        match_kind = EXCLUDED.match_kind,
        candidates = EXCLUDED.candidates,
        checked_at = EXCLUDED.checked_at
"#;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert or refresh the outcome for one scheduled slot. Re-checking the
/// same course at the same start time overwrites the earlier row.
pub async fn record_check(pool: &PgPool, outcome: &CheckOutcome) -> anyhow::Result<()> {
    sqlx::query(UPSERT_CHECK)
        .bind(Uuid::new_v4())
        .bind(outcome.source_key())
        .bind(&outcome.course)
        .bind(outcome.event_at)
        .bind(&outcome.room)
        .bind(outcome.matched)
        .bind(outcome.kind.as_str())
        .bind(outcome.candidates.join("\n"))
        .bind(outcome.checked_at)
        .execute(pool)
        .await
        .with_context(|| format!("failed to record check for {}", outcome.source_key()))?;

    Ok(())
}

pub async fn fetch_checks(
    pool: &PgPool,
    since_date: NaiveDate,
    course: Option<&str>,
) -> anyhow::Result<Vec<CheckOutcome>> {
    let mut query = String::from(
        "SELECT course, event_at, room, matched, match_kind, candidates, checked_at \
         FROM kq_checker.checks \
         WHERE event_at >= $1",
    );

    if course.is_some() {
        query.push_str(" AND course = $2");
    }
    query.push_str(" ORDER BY event_at DESC");

    let since: NaiveDateTime = since_date
        .and_hms_opt(0, 0, 0)
        .context("invalid cutoff date")?;
    let mut rows = sqlx::query(&query).bind(since);

    if let Some(value) = course {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut outcomes = Vec::new();

    for row in records {
        let candidates: String = row.get("candidates");
        let kind: String = row.get("match_kind");
        outcomes.push(CheckOutcome {
            course: row.get("course"),
            event_at: row.get("event_at"),
            room: row.get("room"),
            matched: row.get("matched"),
            kind: MatchKind::from_db(&kind),
            candidates: split_candidates(&candidates),
            checked_at: row.get("checked_at"),
        });
    }

    Ok(outcomes)
}

fn split_candidates(stored: &str) -> Vec<String> {
    stored
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_columns() -> Vec<String> {
        let schema = include_str!("../migrations/0001_create_checks.sql");
        let table = schema
            .split("CREATE TABLE IF NOT EXISTS kq_checker.checks (")
            .nth(1)
            .and_then(|rest| rest.split(");").next())
            .expect("checks table definition");

        table
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn every_schema_column_is_written() {
        let columns = schema_columns();
        assert!(!columns.is_empty());
        for column in &columns {
            assert!(
                UPSERT_CHECK.contains(column.as_str()),
                "column {column} is never written"
            );
        }
        assert_eq!(UPSERT_CHECK.matches('$').count(), columns.len());
    }

    #[test]
    fn stored_candidates_split_per_line() {
        let stored = "2025-11-11 13:45:00 | Physics | Dr. A\n\n2025-11-11 13:50:00 | Chem | \n";
        assert_eq!(
            split_candidates(stored),
            vec![
                "2025-11-11 13:45:00 | Physics | Dr. A".to_string(),
                "2025-11-11 13:50:00 | Chem | ".to_string(),
            ]
        );
        assert!(split_candidates("").is_empty());
    }
}
