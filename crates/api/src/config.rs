use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use quiz_core::model::QuestionCountBounds;
use services::SessionLimits;

/// Runtime configuration, read from flags with environment fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Quiz session HTTP service")]
pub struct Config {
    /// `SQLite` database URL or file path.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://quiz.sqlite3")]
    pub database_url: String,

    /// The address to bind to.
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:3000")]
    pub bind_address: SocketAddr,

    #[arg(long, env = "MIN_QUESTION_COUNT", default_value_t = 1)]
    pub min_question_count: u32,

    #[arg(long, env = "MAX_QUESTION_COUNT", default_value_t = 100)]
    pub max_question_count: u32,

    /// Upper bound, in seconds, on the time reported for a single answer.
    #[arg(long, env = "MAX_TIME_PER_QUESTION", default_value_t = 3600)]
    pub max_time_per_question: u32,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid database url: {raw}")]
    InvalidDbUrl { raw: String },
    #[error("question count bounds {min}..={max} are empty")]
    EmptyCountBounds { min: u32, max: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Config {
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyCountBounds` when min exceeds max or is zero.
    pub fn session_limits(&self) -> Result<SessionLimits, ConfigError> {
        if self.min_question_count == 0 || self.min_question_count > self.max_question_count {
            return Err(ConfigError::EmptyCountBounds {
                min: self.min_question_count,
                max: self.max_question_count,
            });
        }
        Ok(SessionLimits {
            question_count: QuestionCountBounds {
                min: self.min_question_count,
                max: self.max_question_count,
            },
            max_time_per_question_secs: self.max_time_per_question,
        })
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Turn a bare path or relative `sqlite:` URL into an absolute `sqlite://` URL.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw.to_owned();
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its parent directory if missing.
///
/// # Errors
///
/// Returns `ConfigError::InvalidDbUrl` for non-file URLs and
/// `ConfigError::Io` when the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), ConfigError> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let invalid = || ConfigError::InvalidDbUrl {
        raw: db_url.to_owned(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
