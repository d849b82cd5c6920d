use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config;
use crate::domain::ReviewGrade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }

  pub fn parse(s: &str) -> Option<Self> {
    Uuid::parse_str(s).ok().map(Self)
  }
}

impl Default for CardId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for CardId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Acquisition lifecycle of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
  New,
  Learning,
  Graduated,
}

impl CardState {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "new" => Some(Self::New),
      "learning" => Some(Self::Learning),
      "graduated" => Some(Self::Graduated),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::New => "new",
      Self::Learning => "learning",
      Self::Graduated => "graduated",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkKind {
  /// A single token
  Single,
  /// A contiguous group of tokens
  Group,
}

/// Which token span(s) of the context sentence a card was marked from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyMark {
  pub token_ids: Vec<String>,
  pub sentence_id: Option<i64>,
  pub kind: MarkKind,
}

/// Snapshot of the sentence a word was learned from.
///
/// The four text fields are aligned renderings of the same sentence:
/// target script, transliteration, word-by-word decode and free translation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSentence {
  pub target: String,
  pub transliteration: String,
  pub decode: String,
  pub translation: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mark: Option<VocabularyMark>,
}

/// Review tallies per grade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeCounts {
  pub again: u32,
  pub hard: u32,
  pub good: u32,
  pub easy: u32,
}

impl GradeCounts {
  pub fn record(&mut self, grade: ReviewGrade) {
    match grade {
      ReviewGrade::Again => self.again = self.again.saturating_add(1),
      ReviewGrade::Hard => self.hard = self.hard.saturating_add(1),
      ReviewGrade::Good => self.good = self.good.saturating_add(1),
      ReviewGrade::Easy => self.easy = self.easy.saturating_add(1),
    }
  }

  pub fn total(&self) -> u32 {
    self
      .again
      .saturating_add(self.hard)
      .saturating_add(self.good)
      .saturating_add(self.easy)
  }
}

/// Input for creating a card when a learner marks a word or word group
#[derive(Debug, Clone)]
pub struct NewCard {
  pub target_text: String,
  pub native_text: String,
  pub transliteration: Option<String>,
  pub context: ContextSentence,
  pub lesson_id: Option<String>,
  pub level_id: Option<String>,
}

impl NewCard {
  pub fn new(target_text: impl Into<String>, native_text: impl Into<String>, context: ContextSentence) -> Self {
    Self {
      target_text: target_text.into(),
      native_text: native_text.into(),
      transliteration: None,
      context,
      lesson_id: None,
      level_id: None,
    }
  }

  pub fn with_transliteration(mut self, transliteration: impl Into<String>) -> Self {
    self.transliteration = Some(transliteration.into());
    self
  }

  pub fn with_lesson(mut self, level_id: impl Into<String>, lesson_id: impl Into<String>) -> Self {
    self.level_id = Some(level_id.into());
    self.lesson_id = Some(lesson_id.into());
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyCard {
  pub id: CardId,
  pub learner_id: String,
  pub target_text: String,
  pub native_text: String,
  pub transliteration: Option<String>,
  pub context: ContextSentence,
  pub lesson_id: Option<String>,
  pub level_id: Option<String>,

  pub state: CardState,
  pub created_at: DateTime<Utc>,
  pub last_reviewed_at: Option<DateTime<Utc>>,
  /// Set on the first transition into `Graduated`, never cleared
  pub graduated_at: Option<DateTime<Utc>>,
  pub next_review_at: DateTime<Utc>,

  // Stats (review_count == success_count + fail_count)
  pub review_count: u32,
  pub success_count: u32,
  pub fail_count: u32,
  pub consecutive_successes: u32,
  pub grade_counts: GradeCounts,

  // SM-2 fields
  pub repetitions: u32,
  /// Days until the next review; 0 until the first review
  pub interval_days: u32,
  pub ease_factor: f64,
}

impl VocabularyCard {
  /// A brand-new card, due immediately
  pub fn new(learner_id: impl Into<String>, card: NewCard, now: DateTime<Utc>) -> Self {
    Self {
      id: CardId::new(),
      learner_id: learner_id.into(),
      target_text: card.target_text,
      native_text: card.native_text,
      transliteration: card.transliteration,
      context: card.context,
      lesson_id: card.lesson_id,
      level_id: card.level_id,
      state: CardState::New,
      created_at: now,
      last_reviewed_at: None,
      graduated_at: None,
      next_review_at: now,
      review_count: 0,
      success_count: 0,
      fail_count: 0,
      consecutive_successes: 0,
      grade_counts: GradeCounts::default(),
      repetitions: 0,
      interval_days: 0,
      ease_factor: config::DEFAULT_EASE_FACTOR,
    }
  }

  pub fn is_due(&self, at: DateTime<Utc>) -> bool {
    self.state != CardState::Graduated && self.next_review_at <= at
  }

  /// Fraction of successful reviews, 0.0 for unreviewed cards
  pub fn success_rate(&self) -> f64 {
    if self.review_count == 0 {
      0.0
    } else {
      self.success_count as f64 / self.review_count as f64
    }
  }

  /// True if this card represents the given (target, native) pair.
  /// Native text compares case-insensitively; target script compares exactly.
  pub fn is_same_pair(&self, target_text: &str, native_text: &str) -> bool {
    self.target_text == target_text && self.native_text.to_lowercase() == native_text.to_lowercase()
  }

  /// True if either side of the pair is already covered by this card
  pub fn covers_word(&self, target_text: &str, native_text: &str) -> bool {
    self.target_text == target_text || self.native_text.to_lowercase() == native_text.to_lowercase()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn card(now: DateTime<Utc>) -> VocabularyCard {
    VocabularyCard::new("learner", NewCard::new("کتاب", "Buch", ContextSentence::default()), now)
  }

  #[test]
  fn test_new_card_defaults() {
    let now = Utc::now();
    let c = card(now);
    assert_eq!(c.state, CardState::New);
    assert_eq!(c.next_review_at, now);
    assert_eq!(c.created_at, now);
    assert_eq!(c.ease_factor, 2.5);
    assert_eq!(c.interval_days, 0);
    assert_eq!(c.review_count, 0);
    assert!(c.last_reviewed_at.is_none());
    assert!(c.graduated_at.is_none());
  }

  #[test]
  fn test_new_card_is_immediately_due() {
    let now = Utc::now();
    assert!(card(now).is_due(now));
  }

  #[test]
  fn test_future_card_not_due() {
    let now = Utc::now();
    let mut c = card(now);
    c.next_review_at = now + Duration::hours(1);
    assert!(!c.is_due(now));
  }

  #[test]
  fn test_graduated_card_never_due() {
    let now = Utc::now();
    let mut c = card(now);
    c.state = CardState::Graduated;
    c.next_review_at = now - Duration::days(30);
    assert!(!c.is_due(now));
  }

  #[test]
  fn test_success_rate() {
    let mut c = card(Utc::now());
    assert_eq!(c.success_rate(), 0.0);
    c.review_count = 4;
    c.success_count = 3;
    c.fail_count = 1;
    assert!((c.success_rate() - 0.75).abs() < 1e-9);
  }

  #[test]
  fn test_same_pair_native_case_insensitive() {
    let c = card(Utc::now());
    assert!(c.is_same_pair("کتاب", "buch"));
    assert!(!c.is_same_pair("کتاب", "Heft"));
    assert!(!c.is_same_pair("دفتر", "Buch"));
  }

  #[test]
  fn test_covers_either_word() {
    let c = card(Utc::now());
    assert!(c.covers_word("دفتر", "BUCH"));
    assert!(c.covers_word("کتاب", "Heft"));
    assert!(!c.covers_word("دفتر", "Heft"));
  }

  #[test]
  fn test_card_state_strings() {
    for state in [CardState::New, CardState::Learning, CardState::Graduated] {
      assert_eq!(CardState::from_str(state.as_str()), Some(state));
    }
    assert_eq!(CardState::from_str("Graduated"), None);
  }

  #[test]
  fn test_grade_counts_record() {
    let mut counts = GradeCounts::default();
    counts.record(ReviewGrade::Again);
    counts.record(ReviewGrade::Good);
    counts.record(ReviewGrade::Good);
    assert_eq!(counts.again, 1);
    assert_eq!(counts.good, 2);
    assert_eq!(counts.total(), 3);
  }

  #[test]
  fn test_grade_counts_saturate() {
    let mut counts = GradeCounts {
      again: u32::MAX,
      hard: 0,
      good: u32::MAX,
      easy: 1,
    };
    counts.record(ReviewGrade::Again);
    assert_eq!(counts.again, u32::MAX);
    assert_eq!(counts.total(), u32::MAX);
  }

  #[test]
  fn test_context_without_mark_omits_field() {
    let json = serde_json::to_string(&ContextSentence::default()).unwrap();
    assert!(!json.contains("mark"));
    let parsed: ContextSentence = serde_json::from_str(&json).unwrap();
    assert!(parsed.mark.is_none());
  }
}
