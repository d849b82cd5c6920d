//! Test fixtures shared across modules.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::db::SqliteStore;
use crate::domain::{ContextSentence, NewCard, VocabularyCard};
use crate::error::{Result, SrsError};

pub const LEARNER: &str = "learner-1";

/// Creation input with a small context sentence around the word
pub fn new_card_input(target: &str, native: &str) -> NewCard {
  let context = ContextSentence {
    target: format!("این {} است.", target),
    transliteration: String::new(),
    decode: format!("Das {} ist.", native),
    translation: format!("Das ist {}.", native),
    mark: None,
  };
  NewCard::new(target, native, context)
}

/// A fresh card for [`LEARNER`], created (and due) at `now`
pub fn new_card(target: &str, native: &str, now: DateTime<Utc>) -> VocabularyCard {
  VocabularyCard::new(LEARNER, new_card_input(target, native), now)
}

/// On-disk SQLite store in a temporary directory, removed when dropped.
///
/// Goes through the same `init_db` path as the binary, so migrations and
/// the pre-migration backup are exercised too.
pub struct TestEnv {
  /// Kept alive for the lifetime of the database file
  pub temp: TempDir,
  pub store: SqliteStore,
}

impl TestEnv {
  pub fn new() -> Result<Self> {
    let temp = TempDir::new().map_err(|e| SrsError::PersistenceFailure(e.to_string()))?;
    let store = SqliteStore::open(&temp.path().join("data").join("vocabulary.db"))?;
    Ok(Self { temp, store })
  }

  pub fn db_path(&self) -> PathBuf {
    self.temp.path().join("data").join("vocabulary.db")
  }

  /// Open a second store on the same database file
  pub fn reopen(&self) -> Result<SqliteStore> {
    SqliteStore::open(&self.db_path())
  }
}
