//! In-memory card collection for one learner.
//!
//! The repository is the source of truth while a session runs; the
//! [`CardStore`] only receives copies.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{CardId, CardState, NewCard, VocabularyCard};
use crate::error::{Result, SrsError};
use crate::srs::due_set;
use crate::store::{ensure_unique, CardStore};

/// Counts over the whole collection at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
  pub total: usize,
  pub new: usize,
  pub learning: usize,
  pub graduated: usize,
  pub due: usize,
  /// Cards reviewed since UTC midnight
  pub reviewed_today: usize,
}

/// Graduated words, available for use in free practice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveVocabulary {
  pub target_words: Vec<String>,
  pub native_words: Vec<String>,
  pub card_ids: Vec<CardId>,
}

#[derive(Debug, Clone)]
pub struct CardRepository {
  learner_id: String,
  cards: BTreeMap<CardId, VocabularyCard>,
}

impl CardRepository {
  pub fn new(learner_id: impl Into<String>) -> Self {
    Self {
      learner_id: learner_id.into(),
      cards: BTreeMap::new(),
    }
  }

  pub fn from_cards(learner_id: impl Into<String>, cards: impl IntoIterator<Item = VocabularyCard>) -> Self {
    let mut repo = Self::new(learner_id);
    for card in cards {
      repo.cards.insert(card.id, card);
    }
    repo
  }

  pub fn load<S: CardStore + ?Sized>(store: &S, learner_id: &str) -> Result<Self> {
    let cards = store.load_all(learner_id)?;
    tracing::debug!(learner_id, count = cards.len(), "loaded card collection");
    Ok(Self::from_cards(learner_id, cards))
  }

  pub fn learner_id(&self) -> &str {
    &self.learner_id
  }

  pub fn len(&self) -> usize {
    self.cards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }

  pub fn get(&self, card_id: CardId) -> Option<&VocabularyCard> {
    self.cards.get(&card_id)
  }

  pub(crate) fn get_mut(&mut self, card_id: CardId) -> Option<&mut VocabularyCard> {
    self.cards.get_mut(&card_id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &VocabularyCard> {
    self.cards.values()
  }

  pub fn by_state(&self, state: CardState) -> Vec<&VocabularyCard> {
    self.iter().filter(|c| c.state == state).collect()
  }

  pub fn due(&self, now: DateTime<Utc>) -> Vec<&VocabularyCard> {
    due_set::select_due(self.iter(), now)
  }

  /// True if either word of the pair is already on a card
  pub fn is_word_marked(&self, target_text: &str, native_text: &str) -> bool {
    self.iter().any(|c| c.covers_word(target_text, native_text))
  }

  pub fn find_by_words(&self, target_text: &str, native_text: &str) -> Option<&VocabularyCard> {
    self.iter().find(|c| c.covers_word(target_text, native_text))
  }

  pub fn active_vocabulary(&self) -> ActiveVocabulary {
    let mut active = ActiveVocabulary::default();
    for card in self.iter().filter(|c| c.state == CardState::Graduated) {
      active.target_words.push(card.target_text.clone());
      active.native_words.push(card.native_text.clone());
      active.card_ids.push(card.id);
    }
    active
  }

  pub fn stats(&self, now: DateTime<Utc>) -> CollectionStats {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let mut stats = CollectionStats {
      total: self.cards.len(),
      ..CollectionStats::default()
    };

    for card in self.iter() {
      match card.state {
        CardState::New => stats.new += 1,
        CardState::Learning => stats.learning += 1,
        CardState::Graduated => stats.graduated += 1,
      }
      if card.is_due(now) {
        stats.due += 1;
      }
      if card.last_reviewed_at.is_some_and(|at| at >= midnight) {
        stats.reviewed_today += 1;
      }
    }
    stats
  }

  /// Create a card through the store and add it to the collection
  pub fn mark_word<S: CardStore + ?Sized>(
    &mut self,
    store: &S,
    card: NewCard,
    now: DateTime<Utc>,
  ) -> Result<&VocabularyCard> {
    ensure_unique(self.iter(), &card)?;
    let created = store.create(&self.learner_id, card, now)?;
    tracing::info!(card_id = %created.id, target = %created.target_text, "marked new word");
    let id = created.id;
    self.cards.insert(id, created);
    self.cards.get(&id).ok_or(SrsError::CardNotFound(id))
  }

  pub fn remove_card<S: CardStore + ?Sized>(&mut self, store: &S, card_id: CardId) -> Result<VocabularyCard> {
    let removed = self.cards.remove(&card_id).ok_or(SrsError::CardNotFound(card_id))?;
    store.delete(card_id)?;
    Ok(removed)
  }

  /// Remove the first card covering either word; `None` if nothing matched
  pub fn remove_by_words<S: CardStore + ?Sized>(
    &mut self,
    store: &S,
    target_text: &str,
    native_text: &str,
  ) -> Result<Option<VocabularyCard>> {
    match self.find_by_words(target_text, native_text).map(|c| c.id) {
      Some(id) => self.remove_card(store, id).map(Some),
      None => Ok(None),
    }
  }
}
