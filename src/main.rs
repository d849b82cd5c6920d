use chrono::{NaiveTime, Utc};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vocab_trainer::cloze::card_prompt;
use vocab_trainer::db::SqliteStore;
use vocab_trainer::error::LogOnError;
use vocab_trainer::repository::CardRepository;
use vocab_trainer::{config, srs};

fn main() -> ExitCode {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vocab_trainer=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let settings = config::load_settings();

  let store = match SqliteStore::open(&settings.database_path) {
    Ok(store) => store,
    Err(e) => {
      tracing::error!("Failed to open database {}: {}", settings.database_path.display(), e);
      return ExitCode::FAILURE;
    }
  };

  let repo = match CardRepository::load(&store, &settings.learner_id) {
    Ok(repo) => repo,
    Err(e) => {
      tracing::error!("Failed to load cards for {}: {}", settings.learner_id, e);
      return ExitCode::FAILURE;
    }
  };

  let now = Utc::now();
  let stats = repo.stats(now);
  tracing::info!(
    learner_id = %settings.learner_id,
    total = stats.total,
    new = stats.new,
    learning = stats.learning,
    graduated = stats.graduated,
    "collection loaded"
  );

  let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
  if let Some(reviews) = store
    .reviews_since(&settings.learner_id, midnight)
    .log_warn("Failed to count today's reviews")
  {
    tracing::info!(reviews, "reviews submitted today");
  }

  let due = repo.due(now);
  let session_size = settings.session_limit.map_or(due.len(), |limit| due.len().min(limit));
  tracing::info!(due = due.len(), session_size, "due cards");

  match due.first() {
    Some(card) => {
      let prompt = card_prompt(card);
      tracing::info!(card_id = %card.id, prompt = %prompt.target.render("____"), "next card");
    }
    None => match srs::next_due_at(repo.iter(), now) {
      Some(at) => tracing::info!("Nothing due. Next review at {}", at.to_rfc3339()),
      None => tracing::info!("Nothing due."),
    },
  }

  ExitCode::SUCCESS
}
