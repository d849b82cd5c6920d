//! Review session controller.
//!
//! A session reviews a fixed snapshot of the due-set taken when it starts.
//! Cards that become due again during the session (e.g. a 1-day interval
//! that is still "today") do not re-enter it.

use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

use crate::domain::{CardId, GradeCounts, ReviewGrade, ReviewLog, VocabularyCard};
use crate::error::{Result, SrsError};
use crate::persist::{Persist, PersistFailure, PersistRequest, PersistWorker};
use crate::repository::{CardRepository, CollectionStats};
use crate::srs::due_set;
use crate::srs::sm2::{compute_next_schedule, ScheduleUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
  Idle,
  InProgress,
  Completed,
}

/// Totals reported when the queue is exhausted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
  pub reviewed: u32,
  pub grades: GradeCounts,
  /// Cards that graduated during this session
  pub graduated: Vec<CardId>,
  /// Writes known to have failed while the session ran
  pub persist_failures: u32,
  /// Recomputed from the full collection at completion
  pub collection: CollectionStats,
}

/// Result of one accepted review
#[derive(Debug)]
pub struct ReviewReceipt {
  pub card: VocabularyCard,
  pub update: ScheduleUpdate,
  /// Set when the store write could not be handed off; the review still counts
  pub persist_error: Option<SrsError>,
  pub remaining: usize,
}

pub struct ReviewSession<P> {
  repo: CardRepository,
  persister: P,
  phase: SessionPhase,
  limit: Option<usize>,
  queue: VecDeque<CardId>,
  reviewed: HashSet<CardId>,
  grades: GradeCounts,
  graduated: Vec<CardId>,
  persist_failures: u32,
  summary: Option<SessionSummary>,
}

impl<P: Persist> ReviewSession<P> {
  pub fn new(repo: CardRepository, persister: P) -> Self {
    Self {
      repo,
      persister,
      phase: SessionPhase::Idle,
      limit: None,
      queue: VecDeque::new(),
      reviewed: HashSet::new(),
      grades: GradeCounts::default(),
      graduated: Vec::new(),
      persist_failures: 0,
      summary: None,
    }
  }

  /// Review at most `limit` cards (taken from the head of the due-set)
  pub fn with_limit(mut self, limit: Option<usize>) -> Self {
    self.limit = limit;
    self
  }

  pub fn phase(&self) -> SessionPhase {
    self.phase
  }

  pub fn repository(&self) -> &CardRepository {
    &self.repo
  }

  pub fn remaining(&self) -> usize {
    self.queue.len()
  }

  pub fn summary(&self) -> Option<&SessionSummary> {
    self.summary.as_ref()
  }

  /// Head of the remaining queue
  pub fn current(&self) -> Option<&VocabularyCard> {
    if self.phase != SessionPhase::InProgress {
      return None;
    }
    self.queue.front().and_then(|id| self.repo.get(*id))
  }

  /// Snapshot the due-set and begin. An empty snapshot completes at once.
  pub fn start(&mut self, now: DateTime<Utc>) -> Result<SessionPhase> {
    if self.phase != SessionPhase::Idle {
      return Err(SrsError::SessionAlreadyStarted);
    }

    let mut snapshot: VecDeque<CardId> = due_set::select_due(self.repo.iter(), now)
      .into_iter()
      .map(|c| c.id)
      .collect();
    if let Some(limit) = self.limit {
      snapshot.truncate(limit);
    }
    self.queue = snapshot;

    tracing::info!(
      learner_id = self.repo.learner_id(),
      queued = self.queue.len(),
      "review session started"
    );

    if self.queue.is_empty() {
      self.complete(now);
    } else {
      self.phase = SessionPhase::InProgress;
    }
    Ok(self.phase)
  }

  /// Grade the current card.
  ///
  /// The in-memory card is updated before persistence is attempted, and a
  /// persistence error never rolls it back.
  pub fn submit(&mut self, card_id: CardId, grade: ReviewGrade, now: DateTime<Utc>) -> Result<ReviewReceipt> {
    if self.reviewed.contains(&card_id) {
      return Err(SrsError::AlreadyReviewed(card_id));
    }
    if self.phase != SessionPhase::InProgress {
      return Err(SrsError::SessionNotActive);
    }
    if self.queue.front() != Some(&card_id) {
      return Err(SrsError::NotCurrentCard(card_id));
    }

    let card = self.repo.get_mut(card_id).ok_or(SrsError::CardNotFound(card_id))?;
    let update = compute_next_schedule(card, grade, now);
    update.apply_to(card);
    let card = card.clone();

    self.queue.pop_front();
    self.reviewed.insert(card_id);
    self.grades.record(grade);
    if update.graduated_now {
      self.graduated.push(card_id);
    }

    let review = ReviewLog::for_reviewed_card(&card, grade, now);
    let persist_error = self
      .persister
      .persist(PersistRequest {
        card: card.clone(),
        review: Some(review),
      })
      .err();
    if let Some(e) = &persist_error {
      self.persist_failures += 1;
      tracing::warn!(%card_id, "Review applied but not persisted: {}", e);
    }

    if self.queue.is_empty() {
      self.complete(now);
    }

    Ok(ReviewReceipt {
      card,
      update,
      persist_error,
      remaining: self.queue.len(),
    })
  }

  /// Grade the current card with an outcome given by name
  pub fn submit_raw(&mut self, card_id: CardId, outcome: &str, now: DateTime<Utc>) -> Result<ReviewReceipt> {
    let grade: ReviewGrade = outcome.parse()?;
    self.submit(card_id, grade, now)
  }

  /// Count failures the background writer reported after hand-off
  pub fn note_persist_failures(&mut self, count: usize) {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    self.persist_failures = self.persist_failures.saturating_add(count);
    if let Some(summary) = &mut self.summary {
      summary.persist_failures = self.persist_failures;
    }
  }

  /// Pull whatever the background writer has reported so far into the
  /// failure count, returning the drained failures
  pub fn record_worker_failures(&mut self, worker: &mut PersistWorker) -> Vec<PersistFailure> {
    let failures = worker.drain_failures();
    if !failures.is_empty() {
      self.note_persist_failures(failures.len());
    }
    failures
  }

  /// Give back the collection and persister (e.g. to start the next session)
  pub fn into_parts(self) -> (CardRepository, P) {
    (self.repo, self.persister)
  }

  fn complete(&mut self, now: DateTime<Utc>) {
    self.phase = SessionPhase::Completed;
    let summary = SessionSummary {
      reviewed: self.grades.total(),
      grades: self.grades,
      graduated: self.graduated.clone(),
      persist_failures: self.persist_failures,
      collection: self.repo.stats(now),
    };
    tracing::info!(
      reviewed = summary.reviewed,
      graduated = summary.graduated.len(),
      due = summary.collection.due,
      persist_failures = summary.persist_failures,
      "review session completed"
    );
    self.summary = Some(summary);
  }
}
