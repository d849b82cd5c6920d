use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;

use crate::domain::{CardId, CardState, VocabularyCard};
use crate::error::Result;

const CARD_COLUMNS: &str = r#"
    id, learner_id, target_text, native_text, transliteration, context, lesson_id, level_id,
    state, created_at, last_reviewed_at, graduated_at, next_review_at,
    review_count, success_count, fail_count, consecutive_successes,
    repetitions, interval_days, ease_factor, review_counts
"#;

/// Fixed-width RFC 3339 so stored timestamps also sort correctly as text
pub(crate) fn to_db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_card_id(idx: usize, value: &str) -> rusqlite::Result<CardId> {
    CardId::parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("invalid card id {:?}", value).into())
    })
}

pub(crate) fn parse_state(idx: usize, value: &str) -> rusqlite::Result<CardState> {
    CardState::from_str(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, format!("unknown card state {:?}", value).into())
    })
}

fn row_to_card(row: &Row) -> rusqlite::Result<VocabularyCard> {
    let id: String = row.get(0)?;
    let context: String = row.get(5)?;
    let state: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let last_reviewed_at: Option<String> = row.get(10)?;
    let graduated_at: Option<String> = row.get(11)?;
    let next_review_at: String = row.get(12)?;
    let review_counts: String = row.get(20)?;

    Ok(VocabularyCard {
        id: parse_card_id(0, &id)?,
        learner_id: row.get(1)?,
        target_text: row.get(2)?,
        native_text: row.get(3)?,
        transliteration: row.get(4)?,
        context: parse_json(5, &context)?,
        lesson_id: row.get(6)?,
        level_id: row.get(7)?,
        state: parse_state(8, &state)?,
        created_at: parse_timestamp(9, &created_at)?,
        last_reviewed_at: last_reviewed_at.map(|s| parse_timestamp(10, &s)).transpose()?,
        graduated_at: graduated_at.map(|s| parse_timestamp(11, &s)).transpose()?,
        next_review_at: parse_timestamp(12, &next_review_at)?,
        review_count: row.get(13)?,
        success_count: row.get(14)?,
        fail_count: row.get(15)?,
        consecutive_successes: row.get(16)?,
        repetitions: row.get(17)?,
        interval_days: row.get(18)?,
        ease_factor: row.get(19)?,
        grade_counts: parse_json(20, &review_counts)?,
    })
}

pub fn insert_card(conn: &Connection, card: &VocabularyCard) -> Result<()> {
    conn.execute(
        r#"
    INSERT INTO vocabulary_cards (id, learner_id, target_text, native_text, transliteration, context,
                                  lesson_id, level_id, state, created_at, last_reviewed_at, graduated_at,
                                  next_review_at, review_count, success_count, fail_count,
                                  consecutive_successes, repetitions, interval_days, ease_factor, review_counts)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
    "#,
        params![
            card.id.to_string(),
            card.learner_id,
            card.target_text,
            card.native_text,
            card.transliteration,
            serde_json::to_string(&card.context)?,
            card.lesson_id,
            card.level_id,
            card.state.as_str(),
            to_db_timestamp(card.created_at),
            card.last_reviewed_at.map(to_db_timestamp),
            card.graduated_at.map(to_db_timestamp),
            to_db_timestamp(card.next_review_at),
            card.review_count,
            card.success_count,
            card.fail_count,
            card.consecutive_successes,
            card.repetitions,
            card.interval_days,
            card.ease_factor,
            serde_json::to_string(&card.grade_counts)?,
        ],
    )?;
    Ok(())
}

/// Write back the scheduling state of a card. Returns the number of rows changed.
///
/// Identity fields (words, context, created_at) are immutable and not rewritten.
pub fn update_card_after_review(conn: &Connection, card: &VocabularyCard) -> Result<usize> {
    let changed = conn.execute(
        r#"
    UPDATE vocabulary_cards
    SET state = ?1, last_reviewed_at = ?2, graduated_at = ?3, next_review_at = ?4,
        review_count = ?5, success_count = ?6, fail_count = ?7, consecutive_successes = ?8,
        repetitions = ?9, interval_days = ?10, ease_factor = ?11, review_counts = ?12
    WHERE id = ?13
    "#,
        params![
            card.state.as_str(),
            card.last_reviewed_at.map(to_db_timestamp),
            card.graduated_at.map(to_db_timestamp),
            to_db_timestamp(card.next_review_at),
            card.review_count,
            card.success_count,
            card.fail_count,
            card.consecutive_successes,
            card.repetitions,
            card.interval_days,
            card.ease_factor,
            serde_json::to_string(&card.grade_counts)?,
            card.id.to_string(),
        ],
    )?;
    Ok(changed)
}

pub fn get_card_by_id(conn: &Connection, id: CardId) -> Result<Option<VocabularyCard>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM vocabulary_cards WHERE id = ?1", CARD_COLUMNS))?;
    let mut rows = stmt.query(params![id.to_string()])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row_to_card(row)?))
    } else {
        Ok(None)
    }
}

/// All cards of a learner, newest first
pub fn get_learner_cards(conn: &Connection, learner_id: &str) -> Result<Vec<VocabularyCard>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM vocabulary_cards WHERE learner_id = ?1 ORDER BY created_at DESC, id ASC",
        CARD_COLUMNS
    ))?;
    let cards = stmt
        .query_map(params![learner_id], row_to_card)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

pub fn delete_card(conn: &Connection, id: CardId) -> Result<usize> {
    let deleted = conn.execute("DELETE FROM vocabulary_cards WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::run_migrations;
    use crate::domain::{ContextSentence, MarkKind, NewCard, ReviewGrade, VocabularyMark};
    use chrono::Duration;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn marked_card(now: DateTime<Utc>) -> VocabularyCard {
        let context = ContextSentence {
            target: "من کتاب دارم.".into(),
            transliteration: "Man ketāb dāram.".into(),
            decode: "Ich Buch habe.".into(),
            translation: "Ich habe ein Buch.".into(),
            mark: Some(VocabularyMark {
                token_ids: vec!["s3-t1".into()],
                sentence_id: Some(3),
                kind: MarkKind::Single,
            }),
        };
        let input = NewCard::new("کتاب", "Buch", context)
            .with_transliteration("ketāb")
            .with_lesson("a1", "lesson-2");
        VocabularyCard::new("learner", input, now)
    }

    #[test]
    fn test_insert_and_load_preserves_fields() {
        let conn = conn();
        let card = marked_card(Utc::now());
        insert_card(&conn, &card).unwrap();

        let loaded = get_card_by_id(&conn, card.id).unwrap().unwrap();
        assert_eq!(loaded, card);
    }

    #[test]
    fn test_update_after_review() {
        let conn = conn();
        let now = Utc::now();
        let mut card = marked_card(now - Duration::days(1));
        insert_card(&conn, &card).unwrap();

        let update = crate::srs::compute_next_schedule(&card, ReviewGrade::Easy, now);
        update.apply_to(&mut card);
        assert_eq!(update_card_after_review(&conn, &card).unwrap(), 1);

        let loaded = get_card_by_id(&conn, card.id).unwrap().unwrap();
        assert_eq!(loaded, card);
        assert_eq!(loaded.grade_counts.easy, 1);
        assert_eq!(loaded.last_reviewed_at, Some(now));
    }

    #[test]
    fn test_update_missing_card_changes_nothing() {
        let conn = conn();
        let card = marked_card(Utc::now());
        assert_eq!(update_card_after_review(&conn, &card).unwrap(), 0);
    }

    #[test]
    fn test_learner_cards_newest_first() {
        let conn = conn();
        let now = Utc::now();
        let old = marked_card(now - Duration::days(2));
        let mut new = marked_card(now);
        new.target_text = "دفتر".into();
        let mut other = marked_card(now);
        other.learner_id = "someone-else".into();
        for c in [&old, &new, &other] {
            insert_card(&conn, c).unwrap();
        }

        let ids: Vec<_> = get_learner_cards(&conn, "learner").unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[test]
    fn test_delete() {
        let conn = conn();
        let card = marked_card(Utc::now());
        insert_card(&conn, &card).unwrap();
        assert_eq!(delete_card(&conn, card.id).unwrap(), 1);
        assert!(get_card_by_id(&conn, card.id).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let conn = conn();
        let card = marked_card(Utc::now());
        insert_card(&conn, &card).unwrap();
        conn.execute("UPDATE vocabulary_cards SET state = 'mastered'", []).unwrap();
        assert!(get_card_by_id(&conn, card.id).is_err());
    }

    #[test]
    fn test_timestamps_sort_as_text() {
        let a = Utc::now();
        let b = a + Duration::milliseconds(1);
        let c = a + Duration::seconds(1);
        assert!(to_db_timestamp(a) < to_db_timestamp(b));
        assert!(to_db_timestamp(b) < to_db_timestamp(c));
    }
}
