use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    CategoryId, CategoryStats, CategoryTally, Difficulty, Question, QuestionId, QuizAttempt,
    QuizSession, SessionId, SessionStatus, SourceSelection, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Owner-scoped listing parameters for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionQuery {
    pub owner: UserId,
    pub status: Option<SessionStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl SessionQuery {
    #[must_use]
    pub fn for_owner(owner: UserId) -> Self {
        Self {
            owner,
            status: None,
            limit: u32::MAX,
            offset: 0,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Pool resolution criteria: any selector matches, status must be quizzable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolFilter {
    pub sources: SourceSelection,
    pub difficulty: Option<Difficulty>,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a newly created session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is already taken.
    async fn insert_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or mapping failures.
    async fn get_session(&self, id: SessionId) -> Result<Option<QuizSession>, StorageError>;

    /// Overwrite a session only if its stored status still equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session is gone and
    /// `StorageError::Conflict` if the stored status moved on.
    async fn update_session(
        &self,
        session: &QuizSession,
        expected: SessionStatus,
    ) -> Result<(), StorageError>;

    /// List sessions for one owner, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or mapping failures.
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<QuizSession>, StorageError>;

    /// Delete a session row. Attempts must be removed beforehand.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing and `StorageError::Conflict`
    /// while attempts still reference the session.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Record one attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the session already holds an
    /// attempt for the same question and `StorageError::NotFound` when the
    /// session does not exist.
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StorageError>;

    /// Attempts for a session in submission order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or mapping failures.
    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<QuizAttempt>, StorageError>;

    /// Remove every attempt of a session, returning how many were deleted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn delete_attempts_for_session(&self, session_id: SessionId)
    -> Result<u64, StorageError>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert or replace a question together with its options and tags.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend or mapping failures.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// Fetch several questions; unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or mapping failures.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// Ids of quizzable questions matching the filter, in stable pool order
    /// (oldest first).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_pool(&self, filter: &PoolFilter) -> Result<Vec<QuestionId>, StorageError>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    /// Fold one session's tallies into the owner's category records.
    ///
    /// Returns `false` without touching anything if the session was already
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn apply_session_stats(
        &self,
        user_id: UserId,
        session_id: SessionId,
        tallies: &[CategoryTally],
        applied_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend or mapping failures.
    async fn category_stats(&self, user_id: UserId) -> Result<Vec<CategoryStats>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, QuizSession>>>,
    attempts: Arc<Mutex<HashMap<SessionId, Vec<QuizAttempt>>>>,
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    stats: Arc<Mutex<StatsState>>,
}

#[derive(Default)]
struct StatsState {
    records: HashMap<(UserId, CategoryId), CategoryStats>,
    applied: HashSet<SessionId>,
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn insert_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if guard.contains_key(&session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<QuizSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn update_session(
        &self,
        session: &QuizSession,
        expected: SessionStatus,
    ) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let stored = guard.get_mut(&session.id()).ok_or(StorageError::NotFound)?;
        if stored.status() != expected {
            return Err(StorageError::Conflict);
        }
        *stored = session.clone();
        Ok(())
    }

    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<QuizSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut found: Vec<QuizSession> = guard
            .values()
            .filter(|s| s.owner() == query.owner)
            .filter(|s| query.status.is_none_or(|status| s.status() == status))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let attempts = self.attempts.lock().map_err(poisoned)?;
        if attempts.get(&id).is_some_and(|list| !list.is_empty()) {
            return Err(StorageError::Conflict);
        }
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        guard.remove(&id).map(|_| ()).ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        if !self
            .sessions
            .lock()
            .map_err(poisoned)?
            .contains_key(&attempt.session_id)
        {
            return Err(StorageError::NotFound);
        }
        let list = guard.entry(attempt.session_id).or_default();
        if list.iter().any(|a| a.question_id == attempt.question_id) {
            return Err(StorageError::Conflict);
        }
        list.push(attempt.clone());
        Ok(())
    }

    async fn attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let guard = self.attempts.lock().map_err(poisoned)?;
        Ok(guard.get(&session_id).cloned().unwrap_or_default())
    }

    async fn delete_attempts_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<u64, StorageError> {
        let mut guard = self.attempts.lock().map_err(poisoned)?;
        let removed = guard.remove(&session_id).map_or(0, |list| list.len());
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn find_pool(&self, filter: &PoolFilter) -> Result<Vec<QuestionId>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut pool: Vec<&Question> = guard
            .values()
            .filter(|q| q.status().is_quizzable())
            .filter(|q| filter.difficulty.is_none_or(|d| q.difficulty() == d))
            .filter(|q| q.matches_sources(&filter.sources))
            .collect();
        pool.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(pool.into_iter().map(Question::id).collect())
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn apply_session_stats(
        &self,
        user_id: UserId,
        session_id: SessionId,
        tallies: &[CategoryTally],
        applied_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.stats.lock().map_err(poisoned)?;
        if !guard.applied.insert(session_id) {
            return Ok(false);
        }
        for tally in tallies {
            let entry = guard
                .records
                .entry((user_id, tally.category_id))
                .or_insert_with(|| CategoryStats {
                    user_id,
                    category_id: tally.category_id,
                    total_attempts: 0,
                    correct_attempts: 0,
                    updated_at: applied_at,
                });
            entry.total_attempts = entry.total_attempts.saturating_add(tally.total);
            entry.correct_attempts = entry.correct_attempts.saturating_add(tally.correct);
            entry.updated_at = applied_at;
        }
        Ok(true)
    }

    async fn category_stats(&self, user_id: UserId) -> Result<Vec<CategoryStats>, StorageError> {
        let guard = self.stats.lock().map_err(poisoned)?;
        let mut out: Vec<CategoryStats> = guard
            .records
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.category_id);
        Ok(out)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub stats: Arc<dyn StatsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    pub(crate) fn from_repository<R>(repo: R) -> Self
    where
        R: SessionRepository
            + AttemptRepository
            + QuestionRepository
            + StatsRepository
            + Clone
            + 'static,
    {
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let stats: Arc<dyn StatsRepository> = Arc::new(repo);
        Self {
            sessions,
            attempts,
            questions,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        AnswerSubmission, OptionId, QuizMode, SessionConfig, TIMED_SECONDS_PER_QUESTION,
    };
    use quiz_core::time::fixed_now;

    fn build_session(owner: UserId, questions: &[QuestionId]) -> QuizSession {
        let config = SessionConfig {
            title: "Renal".into(),
            mode: QuizMode::Timed,
            question_count: 2,
            sources: SourceSelection {
                categories: vec![CategoryId::random()],
                ..SourceSelection::default()
            },
            difficulty: None,
            shuffle: false,
        };
        QuizSession::new(
            SessionId::random(),
            owner,
            config,
            questions.to_vec(),
            fixed_now(),
        )
        .unwrap()
    }

    fn attempt(session: SessionId, question: QuestionId) -> QuizAttempt {
        QuizAttempt::new(
            session,
            AnswerSubmission {
                question_id: question,
                selected_option_id: OptionId::random(),
                time_spent_secs: 12,
            },
            true,
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn status_guarded_update_detects_lost_race() {
        let repo = InMemoryRepository::new();
        let mut session = build_session(UserId::random(), &[QuestionId::random()]);
        repo.insert_session(&session).await.unwrap();
        assert_eq!(session.time_limit_secs(), Some(TIMED_SECONDS_PER_QUESTION));

        session.start(fixed_now()).unwrap();
        repo.update_session(&session, SessionStatus::NotStarted)
            .await
            .unwrap();

        let err = repo
            .update_session(&session, SessionStatus::NotStarted)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn duplicate_attempt_is_conflict() {
        let repo = InMemoryRepository::new();
        let q = QuestionId::random();
        let session = build_session(UserId::random(), &[q]);
        repo.insert_session(&session).await.unwrap();

        repo.insert_attempt(&attempt(session.id(), q)).await.unwrap();
        let err = repo
            .insert_attempt(&attempt(session.id(), q))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn session_delete_refused_while_attempts_remain() {
        let repo = InMemoryRepository::new();
        let q = QuestionId::random();
        let session = build_session(UserId::random(), &[q]);
        repo.insert_session(&session).await.unwrap();
        repo.insert_attempt(&attempt(session.id(), q)).await.unwrap();

        assert!(matches!(
            repo.delete_session(session.id()).await.unwrap_err(),
            StorageError::Conflict
        ));
        assert_eq!(repo.delete_attempts_for_session(session.id()).await.unwrap(), 1);
        repo.delete_session(session.id()).await.unwrap();
        assert!(repo.get_session(session.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_applied_once_per_session() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let session = SessionId::random();
        let tallies = [CategoryTally {
            category_id: CategoryId::random(),
            total: 3,
            correct: 2,
        }];

        assert!(repo
            .apply_session_stats(user, session, &tallies, fixed_now())
            .await
            .unwrap());
        assert!(!repo
            .apply_session_stats(user, session, &tallies, fixed_now())
            .await
            .unwrap());

        let stats = repo.category_stats(user).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_attempts, 3);
        assert_eq!(stats[0].correct_attempts, 2);
    }

    #[tokio::test]
    async fn listing_is_owner_scoped() {
        let repo = InMemoryRepository::new();
        let alice = UserId::random();
        let bob = UserId::random();
        repo.insert_session(&build_session(alice, &[QuestionId::random()]))
            .await
            .unwrap();
        repo.insert_session(&build_session(bob, &[QuestionId::random()]))
            .await
            .unwrap();

        let listed = repo
            .list_sessions(&SessionQuery::for_owner(alice))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner(), alice);
    }
}
