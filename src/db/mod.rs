pub mod cards;
pub mod reviews;
pub mod schema;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{CardId, NewCard, ReviewLog, VocabularyCard};
use crate::error::{Result, SrsError};
use crate::store::{ensure_unique, CardStore};

// Re-export all public items from submodules
pub use cards::*;
pub use reviews::*;
pub use schema::run_migrations;

pub type DbPool = Arc<Mutex<Connection>>;

/// Error returned when database lock cannot be acquired
#[derive(Debug)]
pub struct DbLockError;

impl std::fmt::Display for DbLockError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Database unavailable")
  }
}

impl std::error::Error for DbLockError {}

impl From<DbLockError> for SrsError {
  fn from(e: DbLockError) -> Self {
    SrsError::PersistenceFailure(e.to_string())
  }
}

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> std::result::Result<MutexGuard<'_, Connection>, DbLockError> {
  pool.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
    DbLockError
  })
}

pub fn init_db(path: &Path) -> rusqlite::Result<DbPool> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).ok();
  }

  // Create backup before migrations if database exists
  if path.exists() {
    let backup_path = path.with_extension("db.backup");
    if let Err(e) = std::fs::copy(path, &backup_path) {
      tracing::warn!("Could not create database backup: {}", e);
    }
  }

  let conn = Connection::open(path)?;
  run_migrations(&conn)?;
  Ok(Arc::new(Mutex::new(conn)))
}

/// SQLite-backed [`CardStore`]
#[derive(Clone)]
pub struct SqliteStore {
  pool: DbPool,
}

impl SqliteStore {
  pub fn open(path: &Path) -> Result<Self> {
    let pool = init_db(path)?;
    tracing::info!(path = %path.display(), "opened card database");
    Ok(Self { pool })
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    run_migrations(&conn)?;
    Ok(Self {
      pool: Arc::new(Mutex::new(conn)),
    })
  }

  pub fn get(&self, card_id: CardId) -> Result<Option<VocabularyCard>> {
    let conn = try_lock(&self.pool)?;
    get_card_by_id(&conn, card_id)
  }

  /// Review history of a card, oldest first
  pub fn reviews_for_card(&self, card_id: CardId) -> Result<Vec<ReviewLog>> {
    let conn = try_lock(&self.pool)?;
    get_reviews_for_card(&conn, card_id)
  }

  pub fn reviews_since(&self, learner_id: &str, since: DateTime<Utc>) -> Result<i64> {
    let conn = try_lock(&self.pool)?;
    count_reviews_since(&conn, learner_id, since)
  }
}

impl CardStore for SqliteStore {
  fn load_all(&self, learner_id: &str) -> Result<Vec<VocabularyCard>> {
    let conn = try_lock(&self.pool)?;
    get_learner_cards(&conn, learner_id)
  }

  fn create(&self, learner_id: &str, card: NewCard, now: DateTime<Utc>) -> Result<VocabularyCard> {
    let conn = try_lock(&self.pool)?;
    let existing = get_learner_cards(&conn, learner_id)?;
    ensure_unique(&existing, &card)?;
    let created = VocabularyCard::new(learner_id, card, now);
    insert_card(&conn, &created)?;
    tracing::debug!(card_id = %created.id, target = %created.target_text, "created card");
    Ok(created)
  }

  fn save(&self, card: &VocabularyCard) -> Result<()> {
    let conn = try_lock(&self.pool)?;
    match update_card_after_review(&conn, card)? {
      0 => Err(SrsError::CardNotFound(card.id)),
      _ => Ok(()),
    }
  }

  fn delete(&self, card_id: CardId) -> Result<()> {
    let conn = try_lock(&self.pool)?;
    delete_card(&conn, card_id)?;
    Ok(())
  }

  fn append_review(&self, log: &ReviewLog) -> Result<()> {
    let conn = try_lock(&self.pool)?;
    insert_review_log(&conn, log)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{CardState, ReviewGrade};
  use crate::repository::CardRepository;
  use crate::testing::{new_card_input, TestEnv, LEARNER};
  use chrono::Duration;

  #[test]
  fn test_create_rejects_duplicate_pair() {
    let store = SqliteStore::open_in_memory().unwrap();
    let now = Utc::now();
    store.create(LEARNER, new_card_input("کتاب", "Buch"), now).unwrap();

    let err = store.create(LEARNER, new_card_input("کتاب", "BUCH"), now).unwrap_err();
    assert!(matches!(err, SrsError::DuplicateCard { .. }));
    assert!(store.create("other", new_card_input("کتاب", "Buch"), now).is_ok());
  }

  #[test]
  fn test_save_missing_card_is_not_found() {
    let store = SqliteStore::open_in_memory().unwrap();
    let card = VocabularyCard::new(LEARNER, new_card_input("کتاب", "Buch"), Utc::now());
    assert!(matches!(store.save(&card), Err(SrsError::CardNotFound(id)) if id == card.id));
  }

  #[test]
  fn test_state_survives_reopen() {
    let env = TestEnv::new().unwrap();
    let now = Utc::now();

    let card_id = {
      let store = &env.store;
      let mut card = store.create(LEARNER, new_card_input("کتاب", "Buch"), now).unwrap();
      let update = crate::srs::compute_next_schedule(&card, ReviewGrade::Good, now);
      update.apply_to(&mut card);
      store.save(&card).unwrap();
      store
        .append_review(&ReviewLog::for_reviewed_card(&card, ReviewGrade::Good, now))
        .unwrap();
      card.id
    };

    let store = env.reopen().unwrap();
    assert!(env.db_path().with_extension("db.backup").exists());

    let repo = CardRepository::load(&store, LEARNER).unwrap();
    let card = repo.get(card_id).unwrap();
    assert_eq!(card.state, CardState::Learning);
    assert_eq!(card.interval_days, 1);
    assert_eq!(card.next_review_at, now + Duration::days(1));
    assert_eq!(store.reviews_for_card(card_id).unwrap().len(), 1);
    assert_eq!(store.reviews_since(LEARNER, now - Duration::minutes(1)).unwrap(), 1);
  }

  #[test]
  fn test_delete_removes_card() {
    let store = SqliteStore::open_in_memory().unwrap();
    let card = store.create(LEARNER, new_card_input("کتاب", "Buch"), Utc::now()).unwrap();
    store.delete(card.id).unwrap();
    assert!(store.get(card.id).unwrap().is_none());
    assert!(store.load_all(LEARNER).unwrap().is_empty());
  }
}
