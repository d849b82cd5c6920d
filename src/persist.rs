//! Handing reviewed cards to the Card Store.
//!
//! The session controller never waits on a write. [`WriteBehind`] queues the
//! request for a background task; [`Direct`] writes inline and reports the
//! result immediately. Either way a failed write does not undo the review.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{CardId, ReviewLog, VocabularyCard};
use crate::error::{LogOnError, Result, SrsError};
use crate::store::CardStore;

/// Snapshot of a reviewed card plus its review log entry
#[derive(Debug, Clone)]
pub struct PersistRequest {
  pub card: VocabularyCard,
  pub review: Option<ReviewLog>,
}

/// A write that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
  pub card_id: CardId,
  pub reason: String,
}

pub trait Persist {
  /// Hand off a write. Errors only report what is already known to have
  /// failed; success does not imply the write has landed.
  fn persist(&self, request: PersistRequest) -> Result<()>;
}

fn write_request<S: CardStore + ?Sized>(store: &S, request: &PersistRequest) -> Result<()> {
  store.save(&request.card)?;
  if let Some(review) = &request.review {
    store.append_review(review)?;
  }
  Ok(())
}

fn as_persistence_failure(e: SrsError) -> SrsError {
  match e {
    SrsError::PersistenceFailure(_) => e,
    other => SrsError::PersistenceFailure(other.to_string()),
  }
}

/// Synchronous persister
pub struct Direct<S> {
  store: S,
}

impl<S: CardStore> Direct<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }
}

impl<S: CardStore> Persist for Direct<S> {
  fn persist(&self, request: PersistRequest) -> Result<()> {
    write_request(&self.store, &request).map_err(as_persistence_failure)
  }
}

/// Handle to the background write worker
#[derive(Clone)]
pub struct WriteBehind {
  tx: mpsc::UnboundedSender<PersistRequest>,
}

/// Background task side of [`WriteBehind`]
pub struct PersistWorker {
  handle: JoinHandle<()>,
  failures: mpsc::UnboundedReceiver<PersistFailure>,
}

impl WriteBehind {
  /// Spawn the worker on the current tokio runtime.
  ///
  /// The worker stops once every `WriteBehind` clone has been dropped and
  /// the queue is drained.
  pub fn spawn<S: CardStore + 'static>(store: Arc<S>) -> (Self, PersistWorker) {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistRequest>();
    let (failure_tx, failures) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
      while let Some(request) = rx.recv().await {
        let card_id = request.card.id;
        let store = Arc::clone(&store);
        let outcome = tokio::task::spawn_blocking(move || write_request(store.as_ref(), &request)).await;

        let reason = match outcome {
          Ok(Ok(())) => {
            tracing::debug!(%card_id, "persisted card");
            continue;
          }
          Ok(Err(e)) => e.to_string(),
          Err(join) => format!("write task aborted: {}", join),
        };

        tracing::warn!(%card_id, "Failed to persist card: {}", reason);
        failure_tx
          .send(PersistFailure { card_id, reason })
          .log_warn("Dropping persistence failure report");
      }
      tracing::debug!("persistence worker stopped");
    });

    (Self { tx }, PersistWorker { handle, failures })
  }
}

impl Persist for WriteBehind {
  fn persist(&self, request: PersistRequest) -> Result<()> {
    let card_id = request.card.id;
    self
      .tx
      .send(request)
      .map_err(|_| SrsError::PersistenceFailure(format!("persistence worker stopped, card {} not queued", card_id)))
  }
}

impl PersistWorker {
  /// Failures reported so far, without waiting
  pub fn drain_failures(&mut self) -> Vec<PersistFailure> {
    let mut drained = Vec::new();
    while let Ok(failure) = self.failures.try_recv() {
      drained.push(failure);
    }
    drained
  }

  /// Wait for the worker to finish (all handles dropped) and collect every
  /// failure it reported
  pub async fn join(mut self) -> Vec<PersistFailure> {
    (&mut self.handle).await.log_warn("Persistence worker panicked");
    self.drain_failures()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ReviewGrade;
  use crate::store::MemoryStore;
  use crate::testing::{new_card_input, LEARNER};
  use chrono::Utc;

  fn request_for(store: &MemoryStore) -> PersistRequest {
    let now = Utc::now();
    let mut card = store.create(LEARNER, new_card_input("کتاب", "Buch"), now).unwrap();
    card.interval_days = 6;
    let review = ReviewLog::for_reviewed_card(&card, ReviewGrade::Good, now);
    PersistRequest {
      card,
      review: Some(review),
    }
  }

  #[test]
  fn test_direct_writes_card_and_log() {
    let store = MemoryStore::new();
    let request = request_for(&store);
    let id = request.card.id;

    let direct = Direct::new(store);
    direct.persist(request).unwrap();
    assert_eq!(direct.store().get(id).unwrap().interval_days, 6);
    assert_eq!(direct.store().reviews().unwrap().len(), 1);
  }

  #[test]
  fn test_direct_maps_errors_to_persistence_failure() {
    let store = MemoryStore::new();
    let mut request = request_for(&store);
    request.card.id = CardId::new();

    let err = Direct::new(store).persist(request).unwrap_err();
    assert!(matches!(err, SrsError::PersistenceFailure(_)));
  }

  #[tokio::test]
  async fn test_write_behind_persists_in_background() {
    let store = Arc::new(MemoryStore::new());
    let request = request_for(&store);
    let id = request.card.id;

    let (writer, worker) = WriteBehind::spawn(Arc::clone(&store));
    writer.persist(request).unwrap();
    drop(writer);

    let failures = worker.join().await;
    assert!(failures.is_empty());
    assert_eq!(store.get(id).unwrap().interval_days, 6);
    assert_eq!(store.reviews().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_write_behind_reports_failures() {
    let store = Arc::new(MemoryStore::new());
    let request = request_for(&store);
    let id = request.card.id;
    store.set_fail_writes(true);

    let (writer, worker) = WriteBehind::spawn(Arc::clone(&store));
    // Enqueue succeeds; the failure only shows up on the worker side
    writer.persist(request).unwrap();
    drop(writer);

    let failures = worker.join().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].card_id, id);
  }

  #[tokio::test]
  async fn test_enqueue_after_worker_stops_fails() {
    let store = Arc::new(MemoryStore::new());
    let request = request_for(&store);

    let (writer, worker) = WriteBehind::spawn(Arc::clone(&store));
    worker.handle.abort();
    let _ = worker.handle.await;

    let err = writer.persist(request).unwrap_err();
    assert!(matches!(err, SrsError::PersistenceFailure(_)));
  }
}
