use chrono::{DateTime, Duration, Utc};

use crate::config::{
  FAILED_INTERVAL_DAYS, FIRST_INTERVAL_DAYS, GRADUATION_INTERVAL_DAYS, GRADUATION_STREAK, MIN_EASE_FACTOR,
  SECOND_INTERVAL_DAYS, SUCCESS_THRESHOLD,
};
use crate::domain::{CardState, GradeCounts, ReviewGrade, VocabularyCard};
use crate::error::Result;

pub struct Sm2Result {
  pub ease_factor: f64,
  pub interval_days: u32,
  pub repetitions: u32,
}

pub fn calculate_sm2(
  quality: u8,
  current_ease_factor: f64,
  current_interval: u32,
  current_repetitions: u32,
) -> Sm2Result {
  if quality < SUCCESS_THRESHOLD {
    // Failed review: reset, retry tomorrow. Ease only moves on success.
    return Sm2Result {
      ease_factor: current_ease_factor,
      interval_days: FAILED_INTERVAL_DAYS,
      repetitions: 0,
    };
  }

  let q = quality as f64;

  // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
  let ease_delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
  let new_ease_factor = (current_ease_factor + ease_delta).max(MIN_EASE_FACTOR);

  let repetitions = current_repetitions.saturating_add(1);
  let interval_days = match repetitions {
    1 => FIRST_INTERVAL_DAYS,
    2 => SECOND_INTERVAL_DAYS,
    _ => ((current_interval as f64) * new_ease_factor).round().max(1.0) as u32,
  };

  Sm2Result {
    ease_factor: new_ease_factor,
    interval_days,
    repetitions,
  }
}

/// Card fields produced by one review
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleUpdate {
  pub grade: ReviewGrade,
  pub state: CardState,
  pub interval_days: u32,
  pub ease_factor: f64,
  pub repetitions: u32,
  pub consecutive_successes: u32,
  pub review_count: u32,
  pub success_count: u32,
  pub fail_count: u32,
  pub grade_counts: GradeCounts,
  pub last_reviewed_at: DateTime<Utc>,
  pub next_review_at: DateTime<Utc>,
  pub graduated_at: Option<DateTime<Utc>>,
  /// This review moved the card into `Graduated`
  pub graduated_now: bool,
}

impl ScheduleUpdate {
  pub fn apply_to(&self, card: &mut VocabularyCard) {
    card.state = self.state;
    card.interval_days = self.interval_days;
    card.ease_factor = self.ease_factor;
    card.repetitions = self.repetitions;
    card.consecutive_successes = self.consecutive_successes;
    card.review_count = self.review_count;
    card.success_count = self.success_count;
    card.fail_count = self.fail_count;
    card.grade_counts = self.grade_counts;
    card.last_reviewed_at = Some(self.last_reviewed_at);
    card.next_review_at = self.next_review_at;
    card.graduated_at = self.graduated_at;
  }
}

/// Compute the next schedule for `card` after a review graded `grade` at `now`.
///
/// Pure: the card is not modified, use [`ScheduleUpdate::apply_to`].
///
/// - Failure: repetitions, streak reset; interval 1 day; state `New`.
/// - Success: repetitions 1 and 2 schedule 1 and 6 days, later ones
///   multiply the previous interval by the updated ease factor.
///   The card graduates once the streak reaches 3 and the interval 21 days.
pub fn compute_next_schedule(card: &VocabularyCard, grade: ReviewGrade, now: DateTime<Utc>) -> ScheduleUpdate {
  let sm2 = calculate_sm2(grade.quality(), card.ease_factor, card.interval_days, card.repetitions);

  let (state, consecutive_successes) = if grade.is_success() {
    let streak = card.consecutive_successes.saturating_add(1);
    let graduates =
      sm2.repetitions >= 3 && streak >= GRADUATION_STREAK && sm2.interval_days >= GRADUATION_INTERVAL_DAYS;
    let state = if graduates { CardState::Graduated } else { CardState::Learning };
    (state, streak)
  } else {
    (CardState::New, 0)
  };

  let graduated_now = state == CardState::Graduated && card.state != CardState::Graduated;
  let graduated_at = match (state, card.graduated_at) {
    (CardState::Graduated, None) => Some(now),
    (_, existing) => existing,
  };

  let mut grade_counts = card.grade_counts;
  grade_counts.record(grade);

  let (success_count, fail_count) = if grade.is_success() {
    (card.success_count.saturating_add(1), card.fail_count)
  } else {
    (card.success_count, card.fail_count.saturating_add(1))
  };

  let next_review_at = now
    .checked_add_signed(Duration::days(i64::from(sm2.interval_days)))
    .unwrap_or(DateTime::<Utc>::MAX_UTC);

  tracing::debug!(
    card_id = %card.id,
    grade = grade.as_str(),
    from = card.state.as_str(),
    to = state.as_str(),
    interval_days = sm2.interval_days,
    ease_factor = sm2.ease_factor,
    "scheduled review"
  );

  ScheduleUpdate {
    grade,
    state,
    interval_days: sm2.interval_days,
    ease_factor: sm2.ease_factor,
    repetitions: sm2.repetitions,
    consecutive_successes,
    review_count: success_count + fail_count,
    success_count,
    fail_count,
    grade_counts,
    last_reviewed_at: now,
    next_review_at,
    graduated_at,
    graduated_now,
  }
}

/// Like [`compute_next_schedule`], for an outcome given by name (`again`, `hard`, `good`, `easy`)
pub fn compute_next_schedule_raw(card: &VocabularyCard, outcome: &str, now: DateTime<Utc>) -> Result<ScheduleUpdate> {
  let grade: ReviewGrade = outcome.parse()?;
  Ok(compute_next_schedule(card, grade, now))
}
