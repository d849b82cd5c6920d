//! Scheduling constants and runtime settings.
//!
//! Runtime settings resolve with priority: config.toml > environment (.env) > default.

use serde::Deserialize;
use std::path::{Path, PathBuf};

// ==================== SM-2 Scheduling ====================

/// Ease factor never drops below this value
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor for freshly created cards
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Quality grades at or above this count as a successful review
pub const SUCCESS_THRESHOLD: u8 = 3;

/// Interval after the first successful repetition
pub const FIRST_INTERVAL_DAYS: u32 = 1;

/// Interval after the second successful repetition
pub const SECOND_INTERVAL_DAYS: u32 = 6;

/// Interval after a failed review (retry tomorrow, not immediately)
pub const FAILED_INTERVAL_DAYS: u32 = 1;

/// Consecutive successes required for graduation
pub const GRADUATION_STREAK: u32 = 3;

/// Minimum interval (days) required for graduation
pub const GRADUATION_INTERVAL_DAYS: u32 = 21;

// ==================== Runtime Settings ====================

pub const DEFAULT_DATABASE_PATH: &str = "data/vocabulary.db";
pub const DEFAULT_LEARNER_ID: &str = "local";
pub const CONFIG_FILE: &str = "config.toml";

/// Configuration file structure for config.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<DatabaseConfig>,
    session: Option<SessionConfig>,
    learner: Option<LearnerConfig>,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionConfig {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LearnerConfig {
    id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Upper bound on cards per review session (None = whole due-set)
    pub session_limit: Option<usize>,
    pub learner_id: String,
}

/// Load settings from ./config.toml and the process environment
pub fn load_settings() -> Settings {
    // Load .env file if present
    let _ = dotenvy::dotenv();
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Load settings from an explicit config file and environment lookup
pub fn load_settings_from<F>(config_path: &Path, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let file = std::fs::read_to_string(config_path)
        .ok()
        .and_then(|contents| match toml::from_str::<FileConfig>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Ignoring malformed {}: {}", config_path.display(), e);
                None
            }
        })
        .unwrap_or_default();

    resolve(file, env)
}

fn resolve<F>(file: FileConfig, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let database_path = match file.database.and_then(|db| db.path) {
        Some(path) => {
            tracing::info!("Using database from config.toml: {}", path);
            PathBuf::from(path)
        }
        None => match env("DATABASE_PATH") {
            Some(path) => {
                tracing::info!("Using database from DATABASE_PATH env: {}", path);
                PathBuf::from(path)
            }
            None => PathBuf::from(DEFAULT_DATABASE_PATH),
        },
    };

    let session_limit = file
        .session
        .and_then(|s| s.limit)
        .or_else(|| env("SESSION_LIMIT").and_then(|v| v.trim().parse().ok()))
        .filter(|limit| *limit > 0);

    let learner_id = file
        .learner
        .and_then(|l| l.id)
        .or_else(|| env("LEARNER_ID"))
        .unwrap_or_else(|| DEFAULT_LEARNER_ID.to_string());

    Settings {
        database_path,
        session_limit,
        learner_id,
    }
}
