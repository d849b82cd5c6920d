//! Card Store collaborator: durable keyed storage for a learner's cards.
//!
//! [`crate::db::SqliteStore`] is the durable implementation; [`MemoryStore`]
//! keeps everything in process and can be told to fail writes.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{CardId, NewCard, ReviewLog, VocabularyCard};
use crate::error::{Result, SrsError};

pub trait CardStore: Send + Sync {
  /// All cards belonging to a learner
  fn load_all(&self, learner_id: &str) -> Result<Vec<VocabularyCard>>;

  /// Create a fresh card; rejects a duplicate (target, native) pair for the learner
  fn create(&self, learner_id: &str, card: NewCard, now: DateTime<Utc>) -> Result<VocabularyCard>;

  /// Overwrite a stored card (last write wins)
  fn save(&self, card: &VocabularyCard) -> Result<()>;

  fn delete(&self, card_id: CardId) -> Result<()>;

  /// Append to the review history
  fn append_review(&self, log: &ReviewLog) -> Result<()>;
}

impl<S: CardStore + ?Sized> CardStore for Arc<S> {
  fn load_all(&self, learner_id: &str) -> Result<Vec<VocabularyCard>> {
    (**self).load_all(learner_id)
  }

  fn create(&self, learner_id: &str, card: NewCard, now: DateTime<Utc>) -> Result<VocabularyCard> {
    (**self).create(learner_id, card, now)
  }

  fn save(&self, card: &VocabularyCard) -> Result<()> {
    (**self).save(card)
  }

  fn delete(&self, card_id: CardId) -> Result<()> {
    (**self).delete(card_id)
  }

  fn append_review(&self, log: &ReviewLog) -> Result<()> {
    (**self).append_review(log)
  }
}

/// Reject `card` if the learner already has a card for the same pair
pub fn ensure_unique<'a, I>(existing: I, card: &NewCard) -> Result<()>
where
  I: IntoIterator<Item = &'a VocabularyCard>,
{
  if existing
    .into_iter()
    .any(|c| c.is_same_pair(&card.target_text, &card.native_text))
  {
    return Err(SrsError::DuplicateCard {
      target: card.target_text.clone(),
      native: card.native_text.clone(),
    });
  }
  Ok(())
}

#[derive(Default)]
pub struct MemoryStore {
  cards: Mutex<HashMap<CardId, VocabularyCard>>,
  reviews: Mutex<Vec<ReviewLog>>,
  fail_writes: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every subsequent save/append fail with `PersistenceFailure`
  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  pub fn get(&self, card_id: CardId) -> Option<VocabularyCard> {
    self.lock_cards().ok()?.get(&card_id).cloned()
  }

  pub fn reviews(&self) -> Result<Vec<ReviewLog>> {
    Ok(self.lock_reviews()?.clone())
  }

  /// Insert a card as-is, bypassing creation defaults
  pub fn insert(&self, card: VocabularyCard) -> Result<()> {
    self.lock_cards()?.insert(card.id, card);
    Ok(())
  }

  fn lock_cards(&self) -> Result<MutexGuard<'_, HashMap<CardId, VocabularyCard>>> {
    self
      .cards
      .lock()
      .map_err(|_| SrsError::PersistenceFailure("memory store lock poisoned".into()))
  }

  fn lock_reviews(&self) -> Result<MutexGuard<'_, Vec<ReviewLog>>> {
    self
      .reviews
      .lock()
      .map_err(|_| SrsError::PersistenceFailure("memory store lock poisoned".into()))
  }

  fn check_writable(&self) -> Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(SrsError::PersistenceFailure("memory store rejected write".into()));
    }
    Ok(())
  }
}

impl CardStore for MemoryStore {
  fn load_all(&self, learner_id: &str) -> Result<Vec<VocabularyCard>> {
    let cards = self.lock_cards()?;
    let mut owned: Vec<_> = cards
      .values()
      .filter(|c| c.learner_id == learner_id)
      .cloned()
      .collect();
    // Newest first
    owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(owned)
  }

  fn create(&self, learner_id: &str, card: NewCard, now: DateTime<Utc>) -> Result<VocabularyCard> {
    self.check_writable()?;
    let mut cards = self.lock_cards()?;
    ensure_unique(cards.values().filter(|c| c.learner_id == learner_id), &card)?;
    let created = VocabularyCard::new(learner_id, card, now);
    cards.insert(created.id, created.clone());
    Ok(created)
  }

  fn save(&self, card: &VocabularyCard) -> Result<()> {
    self.check_writable()?;
    let mut cards = self.lock_cards()?;
    match cards.get_mut(&card.id) {
      Some(stored) => {
        *stored = card.clone();
        Ok(())
      }
      None => Err(SrsError::CardNotFound(card.id)),
    }
  }

  fn delete(&self, card_id: CardId) -> Result<()> {
    self.check_writable()?;
    self.lock_cards()?.remove(&card_id);
    Ok(())
  }

  fn append_review(&self, log: &ReviewLog) -> Result<()> {
    self.check_writable()?;
    let mut reviews = self.lock_reviews()?;
    let mut log = log.clone();
    log.id = reviews.len() as i64 + 1;
    reviews.push(log);
    Ok(())
  }
}
