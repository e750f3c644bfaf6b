use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use quiz_core::model::{
    AnswerSubmission, Capability, Question, QuestionCountBounds, QuestionId, QuizAttempt,
    QuizSession, SessionAction, SessionConfig, SessionId, SessionPatch, SessionStatus,
    TransitionError,
};
use storage::repository::{
    AttemptRepository, PoolFilter, QuestionRepository, SessionQuery, SessionRepository,
    StorageError,
};

use super::results::{SessionResults, build_results};
use super::selection::select_questions;
use crate::Clock;
use crate::error::{AnswerRejection, SessionError};
use crate::guard::{Caller, ensure_capability, ensure_owner};
use crate::stats::StatsAggregator;

/// Default and maximum page size for session listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Tunable bounds applied to caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub question_count: QuestionCountBounds,
    /// Client-reported time per answer is clamped to this many seconds.
    pub max_time_per_question_secs: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            question_count: QuestionCountBounds::default(),
            max_time_per_question_secs: 3600,
        }
    }
}

/// Outcome of a batch submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub submitted: u32,
    pub skipped: u32,
    pub total: u32,
}

/// Owner-scoped listing request; `limit` is clamped to `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListSessions {
    pub status: Option<SessionStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Lifecycle controller for quiz sessions.
///
/// Every operation takes the caller explicitly and checks ownership before
/// touching the session.
#[derive(Clone)]
pub struct QuizSessionService {
    clock: Clock,
    limits: SessionLimits,
    sessions: Arc<dyn SessionRepository>,
    attempts: Arc<dyn AttemptRepository>,
    questions: Arc<dyn QuestionRepository>,
    stats: StatsAggregator,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        attempts: Arc<dyn AttemptRepository>,
        questions: Arc<dyn QuestionRepository>,
        stats: StatsAggregator,
    ) -> Self {
        Self {
            clock,
            limits: SessionLimits::default(),
            sessions,
            attempts,
            questions,
            stats,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Resolve the pool, freeze the question list, and persist a
    /// `not_started` session owned by the caller.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfiguration` for a bad configuration
    /// or an empty pool.
    pub async fn create_session(
        &self,
        caller: &Caller,
        config: SessionConfig,
    ) -> Result<QuizSession, SessionError> {
        ensure_capability(caller, Capability::TakeQuiz)?;
        config.validate(self.limits.question_count)?;

        let filter = PoolFilter {
            sources: config.sources.clone().normalized(),
            difficulty: config.difficulty,
        };
        let pool = self.questions.find_pool(&filter).await?;
        let pool_size = pool.len();
        let selected = select_questions(pool, config.question_count, config.shuffle);

        let session = QuizSession::new(
            SessionId::random(),
            caller.user_id,
            config,
            selected,
            self.clock.now(),
        )?;
        self.sessions.insert_session(&session).await?;

        info!(
            session_id = %session.id(),
            user_id = %caller.user_id,
            mode = session.mode().as_str(),
            questions = session.total_questions(),
            pool_size,
            "quiz session created"
        );
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` or `SessionError::Forbidden`.
    pub async fn get_session(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<QuizSession, SessionError> {
        self.load_owned(caller, id).await
    }

    /// List the caller's own sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on storage failures.
    pub async fn list_sessions(
        &self,
        caller: &Caller,
        request: ListSessions,
    ) -> Result<Vec<QuizSession>, SessionError> {
        let query = SessionQuery {
            owner: caller.user_id,
            status: request.status,
            limit: request
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            offset: request.offset.unwrap_or(0),
        };
        Ok(self.sessions.list_sessions(&query).await?)
    }

    /// `not_started → in_progress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` from any other status.
    pub async fn start_session(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<QuizSession, SessionError> {
        let mut session = self.load_owned(caller, id).await?;
        let from = session.status();
        session.start(self.clock.now())?;
        self.persist(&session, from, SessionAction::Start).await?;
        info!(session_id = %id, user_id = %caller.user_id, "quiz session started");
        Ok(session)
    }

    /// `in_progress → paused`, recording the client's remaining time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` from any other status.
    pub async fn pause_session(
        &self,
        caller: &Caller,
        id: SessionId,
        time_remaining_secs: Option<u32>,
    ) -> Result<QuizSession, SessionError> {
        let mut session = self.load_owned(caller, id).await?;
        let from = session.status();
        session.pause(time_remaining_secs, self.clock.now())?;
        self.persist(&session, from, SessionAction::Pause).await?;
        info!(
            session_id = %id,
            user_id = %caller.user_id,
            time_remaining = ?session.time_remaining_secs(),
            "quiz session paused"
        );
        Ok(session)
    }

    /// `paused → in_progress`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` from any other status.
    pub async fn resume_session(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<QuizSession, SessionError> {
        let mut session = self.load_owned(caller, id).await?;
        let from = session.status();
        session.resume(self.clock.now())?;
        self.persist(&session, from, SessionAction::Resume).await?;
        info!(
            session_id = %id,
            user_id = %caller.user_id,
            paused_secs = session.paused_secs(),
            "quiz session resumed"
        );
        Ok(session)
    }

    /// General field update for sessions that are not completed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` once completed.
    pub async fn update_session(
        &self,
        caller: &Caller,
        id: SessionId,
        patch: SessionPatch,
    ) -> Result<QuizSession, SessionError> {
        let mut session = self.load_owned(caller, id).await?;
        if patch.is_empty() {
            return Ok(session);
        }
        let from = session.status();
        session.update(patch, self.clock.now())?;
        self.persist(&session, from, SessionAction::Update).await?;
        Ok(session)
    }

    /// Record one answer. Correctness is decided now and stored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DuplicateAnswer` if the question was already
    /// answered, `SessionError::InvalidAnswer` for a question outside the
    /// session or a foreign option, `SessionError::QuestionNotFound` if the
    /// question left the bank, and `SessionError::InvalidTransition` unless
    /// the session is in progress.
    pub async fn submit_answer(
        &self,
        caller: &Caller,
        id: SessionId,
        answer: AnswerSubmission,
    ) -> Result<QuizAttempt, SessionError> {
        let session = self.load_owned(caller, id).await?;
        session.ensure_accepts_answers()?;

        let question = self.questions.get_question(answer.question_id).await?;
        let is_correct = check_answer(&session, question.as_ref(), &answer)?;
        let attempt = self.build_attempt(id, answer, is_correct);

        match self.attempts.insert_attempt(&attempt).await {
            Ok(()) => {}
            Err(StorageError::Conflict) => return Err(SessionError::DuplicateAnswer),
            Err(e) => return Err(e.into()),
        }

        info!(
            session_id = %id,
            question_id = %attempt.question_id,
            is_correct,
            "answer recorded"
        );
        Ok(attempt)
    }

    /// Record many answers; already-answered questions are skipped.
    ///
    /// Every tuple is validated before anything is written, so one invalid
    /// tuple rejects the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidAnswer` for an empty batch or any invalid
    /// tuple, and `SessionError::InvalidTransition` unless in progress.
    pub async fn submit_answers_batch(
        &self,
        caller: &Caller,
        id: SessionId,
        answers: Vec<AnswerSubmission>,
    ) -> Result<BatchOutcome, SessionError> {
        if answers.is_empty() {
            return Err(AnswerRejection::EmptyBatch.into());
        }
        let session = self.load_owned(caller, id).await?;
        session.ensure_accepts_answers()?;

        let mut seen = HashSet::new();
        let ids: Vec<QuestionId> = answers
            .iter()
            .map(|a| a.question_id)
            .filter(|q| seen.insert(*q))
            .collect();
        let questions: HashMap<QuestionId, Question> = self
            .questions
            .get_questions(&ids)
            .await?
            .into_iter()
            .map(|q| (q.id(), q))
            .collect();

        let mut graded = Vec::with_capacity(answers.len());
        for answer in answers {
            let is_correct = check_answer(&session, questions.get(&answer.question_id), &answer)?;
            graded.push(self.build_attempt(id, answer, is_correct));
        }

        let already: HashSet<QuestionId> = self
            .attempts
            .attempts_for_session(id)
            .await?
            .into_iter()
            .map(|a| a.question_id)
            .collect();

        let total = u32::try_from(graded.len()).unwrap_or(u32::MAX);
        let mut submitted = 0_u32;
        for attempt in graded {
            if already.contains(&attempt.question_id) {
                continue;
            }
            match self.attempts.insert_attempt(&attempt).await {
                Ok(()) => submitted += 1,
                Err(StorageError::Conflict) => {
                    warn!(
                        session_id = %id,
                        question_id = %attempt.question_id,
                        "duplicate answer skipped"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        let outcome = BatchOutcome {
            submitted,
            skipped: total - submitted,
            total,
        };
        info!(
            session_id = %id,
            submitted = outcome.submitted,
            skipped = outcome.skipped,
            "answer batch recorded"
        );
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns `SessionError::NotFound` or `SessionError::Forbidden`.
    pub async fn list_attempts(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<Vec<QuizAttempt>, SessionError> {
        self.load_owned(caller, id).await?;
        Ok(self.attempts.attempts_for_session(id).await?)
    }

    /// Finalize and score the session, then fold it into the owner's stats.
    ///
    /// Stats failures are logged and do not fail the completion.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` for a second completion,
    /// including one that loses a race with a concurrent completion.
    pub async fn complete_session(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<QuizSession, SessionError> {
        let mut session = self.load_owned(caller, id).await?;
        let from = session.status();
        // Fail fast before reading attempts.
        from.apply(SessionAction::Complete)?;

        let attempts = self.attempts.attempts_for_session(id).await?;
        let correct = attempts.iter().filter(|a| a.is_correct).count();
        let correct = u32::try_from(correct).unwrap_or(u32::MAX);
        let answered_secs = attempts
            .iter()
            .fold(0_u32, |acc, a| acc.saturating_add(a.time_spent_secs));

        let score = session.complete(correct, answered_secs, self.clock.now())?;
        self.persist(&session, from, SessionAction::Complete).await?;

        info!(
            session_id = %id,
            user_id = %caller.user_id,
            score = %score,
            percent = score.percent(),
            total_time_secs = ?session.total_time_spent_secs(),
            "quiz session completed"
        );

        if let Err(err) = self.stats.record_session(&session, &attempts).await {
            warn!(session_id = %id, error = %err, "stats aggregation failed");
        }

        Ok(session)
    }

    /// Score and breakdowns of a completed session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` until the session is completed.
    pub async fn session_results(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<SessionResults, SessionError> {
        let session = self.load_owned(caller, id).await?;
        let score = session.final_score()?;
        let attempts = self.attempts.attempts_for_session(id).await?;
        let questions = self.questions.get_questions(session.question_ids()).await?;
        Ok(build_results(&session, score, attempts, &questions))
    }

    /// Delete a session and all its attempts, attempts first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if either step fails; the session row
    /// is left in place when attempt deletion fails.
    pub async fn delete_session(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<(), SessionError> {
        self.load_owned(caller, id).await?;
        let removed = self.attempts.delete_attempts_for_session(id).await?;
        self.sessions.delete_session(id).await?;
        info!(
            session_id = %id,
            user_id = %caller.user_id,
            attempts_removed = removed,
            "quiz session deleted"
        );
        Ok(())
    }

    async fn load_owned(
        &self,
        caller: &Caller,
        id: SessionId,
    ) -> Result<QuizSession, SessionError> {
        let session = self
            .sessions
            .get_session(id)
            .await?
            .ok_or(SessionError::NotFound)?;
        if let Err(denied) = ensure_owner(caller, session.owner()) {
            warn!(session_id = %id, user_id = %caller.user_id, "session access denied");
            return Err(denied.into());
        }
        Ok(session)
    }

    fn build_attempt(
        &self,
        id: SessionId,
        mut answer: AnswerSubmission,
        is_correct: bool,
    ) -> QuizAttempt {
        answer.time_spent_secs = answer
            .time_spent_secs
            .min(self.limits.max_time_per_question_secs);
        QuizAttempt::new(id, answer, is_correct, self.clock.now())
    }

    /// Status-guarded write. A lost race is re-read and reported against the
    /// status that won.
    async fn persist(
        &self,
        session: &QuizSession,
        expected: SessionStatus,
        action: SessionAction,
    ) -> Result<(), SessionError> {
        match self.sessions.update_session(session, expected).await {
            Ok(()) => Ok(()),
            Err(StorageError::Conflict) => {
                let current = self
                    .sessions
                    .get_session(session.id())
                    .await?
                    .ok_or(SessionError::NotFound)?;
                warn!(
                    session_id = %session.id(),
                    expected = %expected,
                    actual = %current.status(),
                    "concurrent session update lost"
                );
                Err(match current.status().apply(action) {
                    Err(e) => e.into(),
                    Ok(_) => SessionError::InvalidTransition(TransitionError::Illegal {
                        from: current.status(),
                        action,
                    }),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Membership and option checks for one answer; returns its correctness.
///
/// A frozen question deleted from the bank since creation is `QuestionNotFound`.
fn check_answer(
    session: &QuizSession,
    question: Option<&Question>,
    answer: &AnswerSubmission,
) -> Result<bool, SessionError> {
    if !session.contains_question(answer.question_id) {
        return Err(AnswerRejection::QuestionNotInSession.into());
    }
    let question = question.ok_or(SessionError::QuestionNotFound)?;
    question
        .is_correct_option(answer.selected_option_id)
        .ok_or_else(|| AnswerRejection::OptionNotInQuestion.into())
}
