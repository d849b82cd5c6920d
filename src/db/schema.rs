use rusqlite::{Connection, Result};

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Create tables with COMPLETE schema for new databases
  // Migrations below handle upgrades for existing databases
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS vocabulary_cards (
      id TEXT PRIMARY KEY,
      learner_id TEXT NOT NULL,
      target_text TEXT NOT NULL,
      native_text TEXT NOT NULL,
      transliteration TEXT,
      context TEXT NOT NULL,
      lesson_id TEXT,
      level_id TEXT,
      state TEXT NOT NULL DEFAULT 'new',
      created_at TEXT NOT NULL,
      last_reviewed_at TEXT,
      graduated_at TEXT,
      next_review_at TEXT NOT NULL,
      review_count INTEGER NOT NULL DEFAULT 0,
      success_count INTEGER NOT NULL DEFAULT 0,
      fail_count INTEGER NOT NULL DEFAULT 0,
      consecutive_successes INTEGER NOT NULL DEFAULT 0,
      repetitions INTEGER NOT NULL DEFAULT 0,
      interval_days INTEGER NOT NULL DEFAULT 0,
      ease_factor REAL NOT NULL DEFAULT 2.5,
      review_counts TEXT NOT NULL DEFAULT '{"again":0,"hard":0,"good":0,"easy":0}'
    );

    CREATE TABLE IF NOT EXISTS srs_reviews (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      card_id TEXT NOT NULL,
      learner_id TEXT NOT NULL,
      grade TEXT NOT NULL,
      quality INTEGER NOT NULL,
      success INTEGER NOT NULL,
      interval_days INTEGER NOT NULL,
      state TEXT NOT NULL,
      reviewed_at TEXT NOT NULL
    );

    -- Indexes
    CREATE INDEX IF NOT EXISTS idx_vocabulary_cards_learner ON vocabulary_cards(learner_id);
    CREATE INDEX IF NOT EXISTS idx_vocabulary_cards_next_review ON vocabulary_cards(learner_id, next_review_at);
    CREATE INDEX IF NOT EXISTS idx_srs_reviews_card_id ON srs_reviews(card_id);
    CREATE INDEX IF NOT EXISTS idx_srs_reviews_reviewed_at ON srs_reviews(reviewed_at);
    "#,
  )?;

  // ============================================================
  // MIGRATIONS FOR EXISTING DATABASES
  // These are no-ops for new databases (columns already exist)
  // ============================================================

  // Migration: graduated_at was not stored originally. Backfill it from the
  // last review of cards that are already graduated.
  let had_graduated_at = column_exists(conn, "vocabulary_cards", "graduated_at");
  add_column_if_missing(conn, "vocabulary_cards", "graduated_at", "TEXT")?;
  if !had_graduated_at {
    conn.execute(
      "UPDATE vocabulary_cards SET graduated_at = last_reviewed_at WHERE state = 'graduated' AND graduated_at IS NULL",
      [],
    )?;
  }

  Ok(())
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
  conn
    .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
    .is_ok()
}

/// Add a column if it doesn't already exist
fn add_column_if_missing(conn: &Connection, table: &str, column: &str, column_def: &str) -> Result<()> {
  if !column_exists(conn, table, column) {
    conn.execute(
      &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def),
      [],
    )?;
  }
  Ok(())
}
