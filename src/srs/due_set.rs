//! Due-set selection: which cards are reviewable right now, and in what order.

use chrono::{DateTime, Utc};

use crate::domain::{CardState, VocabularyCard};

/// Cards due at `now`, most overdue first (ties broken by id).
///
/// Graduated cards are never returned. An empty result is the normal
/// "nothing to review" condition.
pub fn select_due<'a, I>(cards: I, now: DateTime<Utc>) -> Vec<&'a VocabularyCard>
where
  I: IntoIterator<Item = &'a VocabularyCard>,
{
  let mut due: Vec<&VocabularyCard> = cards.into_iter().filter(|c| c.is_due(now)).collect();
  due.sort_by(|a, b| a.next_review_at.cmp(&b.next_review_at).then_with(|| a.id.cmp(&b.id)));
  due
}

pub fn due_count<'a, I>(cards: I, now: DateTime<Utc>) -> usize
where
  I: IntoIterator<Item = &'a VocabularyCard>,
{
  cards.into_iter().filter(|c| c.is_due(now)).count()
}

/// Earliest upcoming review among cards not yet due (for "come back at ...")
pub fn next_due_at<'a, I>(cards: I, now: DateTime<Utc>) -> Option<DateTime<Utc>>
where
  I: IntoIterator<Item = &'a VocabularyCard>,
{
  cards
    .into_iter()
    .filter(|c| c.state != CardState::Graduated && c.next_review_at > now)
    .map(|c| c.next_review_at)
    .min()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::new_card;
  use chrono::Duration;

  #[test]
  fn test_empty_collection() {
    let cards: Vec<VocabularyCard> = Vec::new();
    assert!(select_due(&cards, Utc::now()).is_empty());
  }

  #[test]
  fn test_graduated_overdue_and_future_learning_yield_nothing() {
    let now = Utc::now();
    let mut graduated = new_card("کتاب", "Buch", now);
    graduated.state = CardState::Graduated;
    graduated.next_review_at = now - Duration::days(2);

    let mut learning = new_card("دفتر", "Heft", now);
    learning.state = CardState::Learning;
    learning.next_review_at = now + Duration::days(2);

    let cards = vec![graduated, learning];
    assert!(select_due(&cards, now).is_empty());
    assert_eq!(due_count(&cards, now), 0);
  }

  #[test]
  fn test_due_boundary_is_inclusive() {
    let now = Utc::now();
    let card = new_card("کتاب", "Buch", now);
    let cards = vec![card];
    assert_eq!(select_due(&cards, now).len(), 1);
    assert!(select_due(&cards, now - Duration::seconds(1)).is_empty());
  }

  #[test]
  fn test_most_overdue_first() {
    let now = Utc::now();
    let mut a = new_card("a", "a", now);
    a.next_review_at = now - Duration::hours(1);
    let mut b = new_card("b", "b", now);
    b.next_review_at = now - Duration::days(3);
    let mut c = new_card("c", "c", now);
    c.next_review_at = now - Duration::minutes(5);

    let cards = vec![a.clone(), b.clone(), c.clone()];
    let order: Vec<_> = select_due(&cards, now).iter().map(|card| card.id).collect();
    assert_eq!(order, vec![b.id, a.id, c.id]);
  }

  #[test]
  fn test_ties_broken_by_id() {
    let now = Utc::now();
    let cards: Vec<_> = (0..5).map(|i| new_card(&format!("w{}", i), &format!("n{}", i), now)).collect();

    let mut expected: Vec<_> = cards.iter().map(|c| c.id).collect();
    expected.sort();

    let order: Vec<_> = select_due(cards.iter().rev(), now).iter().map(|c| c.id).collect();
    assert_eq!(order, expected);
  }

  #[test]
  fn test_never_returns_graduated() {
    let now = Utc::now();
    let cards: Vec<_> = (0..6)
      .map(|i| {
        let mut c = new_card(&format!("w{}", i), &format!("n{}", i), now - Duration::days(10));
        c.next_review_at = now - Duration::days(i);
        if i % 2 == 0 {
          c.state = CardState::Graduated;
        }
        c
      })
      .collect();

    let due = select_due(&cards, now);
    assert_eq!(due.len(), 3);
    assert!(due.iter().all(|c| c.state != CardState::Graduated));
  }

  #[test]
  fn test_next_due_at_skips_graduated() {
    let now = Utc::now();
    let mut soon = new_card("a", "a", now);
    soon.next_review_at = now + Duration::hours(5);
    let mut graduated = new_card("b", "b", now);
    graduated.state = CardState::Graduated;
    graduated.next_review_at = now + Duration::hours(1);
    let overdue = new_card("c", "c", now - Duration::hours(1));

    let cards = vec![soon.clone(), graduated, overdue];
    assert_eq!(next_due_at(&cards, now), Some(soon.next_review_at));
  }
}
