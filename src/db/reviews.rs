//! Review history (srs_reviews)

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::db::cards::{parse_card_id, parse_state, parse_timestamp, to_db_timestamp};
use crate::domain::{ReviewGrade, ReviewLog};
use crate::error::Result;

pub fn insert_review_log(conn: &Connection, log: &ReviewLog) -> Result<i64> {
    conn.execute(
        r#"
    INSERT INTO srs_reviews (card_id, learner_id, grade, quality, success, interval_days, state, reviewed_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    "#,
        params![
            log.card_id.to_string(),
            log.learner_id,
            log.grade.as_str(),
            log.quality(),
            if log.success { 1 } else { 0 },
            log.interval_days,
            log.state.as_str(),
            to_db_timestamp(log.reviewed_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Review history of one card, oldest first
pub fn get_reviews_for_card(conn: &Connection, card_id: crate::domain::CardId) -> Result<Vec<ReviewLog>> {
    let mut stmt = conn.prepare(
        r#"
    SELECT id, card_id, learner_id, grade, success, interval_days, state, reviewed_at
    FROM srs_reviews
    WHERE card_id = ?1
    ORDER BY reviewed_at ASC, id ASC
    "#,
    )?;

    let logs = stmt
        .query_map(params![card_id.to_string()], |row| {
            let card_id: String = row.get(1)?;
            let grade: String = row.get(3)?;
            let state: String = row.get(6)?;
            let reviewed_at: String = row.get(7)?;
            Ok(ReviewLog {
                id: row.get(0)?,
                card_id: parse_card_id(1, &card_id)?,
                learner_id: row.get(2)?,
                grade: grade
                    .parse::<ReviewGrade>()
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
                success: row.get::<_, i64>(4)? == 1,
                interval_days: row.get(5)?,
                state: parse_state(6, &state)?,
                reviewed_at: parse_timestamp(7, &reviewed_at)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(logs)
}

/// Number of reviews a learner submitted since `since`
pub fn count_reviews_since(conn: &Connection, learner_id: &str, since: DateTime<Utc>) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM srs_reviews WHERE learner_id = ?1 AND reviewed_at >= ?2",
        params![learner_id, to_db_timestamp(since)],
        |row| row.get(0),
    )?;
    Ok(count)
}
