use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::config;
use crate::domain::{CardId, CardState, VocabularyCard};
use crate::error::SrsError;

/// Learner's self-reported recall after seeing the answer, worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGrade {
  Again,
  Hard,
  Good,
  Easy,
}

impl ReviewGrade {
  pub const ALL: [ReviewGrade; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];

  /// SM-2 quality on the 0-5 scale
  pub fn quality(&self) -> u8 {
    match self {
      Self::Again => 0,
      Self::Hard => 3,
      Self::Good => 4,
      Self::Easy => 5,
    }
  }

  pub fn from_quality(value: u8) -> Result<Self, SrsError> {
    match value {
      0 => Ok(Self::Again),
      3 => Ok(Self::Hard),
      4 => Ok(Self::Good),
      5 => Ok(Self::Easy),
      other => Err(SrsError::InvalidOutcome(other.to_string())),
    }
  }

  pub fn is_success(&self) -> bool {
    self.quality() >= config::SUCCESS_THRESHOLD
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Again => "again",
      Self::Hard => "hard",
      Self::Good => "good",
      Self::Easy => "easy",
    }
  }
}

impl FromStr for ReviewGrade {
  type Err = SrsError;

  /// Accepts the grade names plus the older `failed`/`medium` button labels
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "again" | "failed" => Ok(Self::Again),
      "hard" => Ok(Self::Hard),
      "good" | "medium" => Ok(Self::Good),
      "easy" => Ok(Self::Easy),
      other => Err(SrsError::InvalidOutcome(other.to_string())),
    }
  }
}

/// One submitted review, as appended to the review history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLog {
  pub id: i64,
  pub card_id: CardId,
  pub learner_id: String,
  pub grade: ReviewGrade,
  pub success: bool,
  /// Interval scheduled by this review
  pub interval_days: u32,
  /// State the card moved into
  pub state: CardState,
  pub reviewed_at: DateTime<Utc>,
}

impl ReviewLog {
  /// Build a log entry from a card that has already had the review applied
  pub fn for_reviewed_card(card: &VocabularyCard, grade: ReviewGrade, reviewed_at: DateTime<Utc>) -> Self {
    Self {
      id: 0,
      card_id: card.id,
      learner_id: card.learner_id.clone(),
      grade,
      success: grade.is_success(),
      interval_days: card.interval_days,
      state: card.state,
      reviewed_at,
    }
  }

  pub fn quality(&self) -> u8 {
    self.grade.quality()
  }
}
