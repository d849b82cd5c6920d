//! Crate-wide error type.

use thiserror::Error;

use crate::domain::CardId;

#[derive(Error, Debug)]
pub enum SrsError {
  #[error("unrecognized review outcome: {0:?}")]
  InvalidOutcome(String),

  #[error("card {0} was already reviewed in this session")]
  AlreadyReviewed(CardId),

  #[error("card {0} is not the current card of this session")]
  NotCurrentCard(CardId),

  #[error("no review session is in progress")]
  SessionNotActive,

  #[error("review session was already started")]
  SessionAlreadyStarted,

  #[error("failed to persist card: {0}")]
  PersistenceFailure(String),

  #[error("a card for {target:?} / {native:?} already exists")]
  DuplicateCard { target: String, native: String },

  #[error("card {0} not found")]
  CardNotFound(CardId),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SrsError>;

/// Extension trait for logging errors before discarding them
pub trait LogOnError<T> {
  /// Log the error at warn level and return None
  fn log_warn(self, context: &str) -> Option<T>;
  /// Log the error at warn level and return the default
  fn log_warn_default(self, context: &str) -> T
  where
    T: Default;
}

impl<T, E: std::fmt::Display> LogOnError<T> for std::result::Result<T, E> {
  fn log_warn(self, context: &str) -> Option<T> {
    match self {
      Ok(v) => Some(v),
      Err(e) => {
        tracing::warn!("{}: {}", context, e);
        None
      }
    }
  }

  fn log_warn_default(self, context: &str) -> T
  where
    T: Default,
  {
    match self {
      Ok(v) => v,
      Err(e) => {
        tracing::warn!("{}: {}", context, e);
        T::default()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_log_warn_passes_ok_through() {
    let ok: std::result::Result<u32, String> = Ok(7);
    assert_eq!(ok.log_warn("ctx"), Some(7));
  }

  #[test]
  fn test_log_warn_default_on_error() {
    let err: std::result::Result<u32, String> = Err("boom".into());
    assert_eq!(err.log_warn_default("ctx"), 0);
  }

  #[test]
  fn test_invalid_outcome_message() {
    let e = SrsError::InvalidOutcome("meh".into());
    assert_eq!(e.to_string(), "unrecognized review outcome: \"meh\"");
  }
}
