use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::questions::QuestionService;
use crate::sessions::{QuizSessionService, SessionLimits};
use crate::stats::StatsAggregator;

/// Assembles the services the HTTP layer exposes.
#[derive(Clone)]
pub struct AppServices {
    sessions: Arc<QuizSessionService>,
    questions: Arc<QuestionService>,
    stats: Arc<StatsAggregator>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if connecting or migrating fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        limits: SessionLimits,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, limits))
    }

    /// Build services over an already-open storage backend.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, limits: SessionLimits) -> Self {
        let stats = StatsAggregator::new(
            clock,
            Arc::clone(&storage.stats),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.questions),
        );
        let sessions = QuizSessionService::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.questions),
            stats.clone(),
        )
        .with_limits(limits);
        let questions = QuestionService::new(clock, Arc::clone(&storage.questions));

        Self {
            sessions: Arc::new(sessions),
            questions: Arc::new(questions),
            stats: Arc::new(stats),
        }
    }

    #[must_use]
    pub fn sessions(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn questions(&self) -> Arc<QuestionService> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsAggregator> {
        Arc::clone(&self.stats)
    }
}
