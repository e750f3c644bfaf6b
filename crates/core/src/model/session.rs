use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{CategoryId, Difficulty, QuestionId, QuestionSetId, SessionId, TagId, UserId};
use crate::time::elapsed_secs;

/// Title used when the caller leaves it blank.
pub const DEFAULT_TITLE: &str = "Custom Quiz";
pub const MAX_TITLE_LEN: usize = 200;
/// Time budget granted per frozen question in timed mode.
pub const TIMED_SECONDS_PER_QUESTION: u32 = 60;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Rejections raised while validating a new session configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionConfigError {
    #[error("at least one category, tag, or question set must be selected")]
    NoSource,

    #[error("question count {count} is outside {min}..={max}")]
    CountOutOfBounds { count: u32, min: u32, max: u32 },

    #[error("title exceeds {max} characters")]
    TitleTooLong { max: usize },

    #[error("no questions match the selected sources")]
    EmptyPool,
}

/// A lifecycle action that does not apply to the current status.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("session already completed")]
    AlreadyCompleted,

    #[error("cannot {action} a session that is {from}")]
    Illegal {
        from: SessionStatus,
        action: SessionAction,
    },
}

/// Persisted session state that cannot be rehydrated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid mode: {0}")]
    InvalidMode(String),

    #[error("{status} session is missing {field}")]
    MissingField {
        status: SessionStatus,
        field: &'static str,
    },

    #[error("frozen question list is empty")]
    EmptyQuestionList,
}

//
// ─── STATUS & ACTIONS ─────────────────────────────────────────────────────────
//

/// Where a session sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Paused,
    Completed,
}

/// Operations that move (or require) a particular status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    Complete,
    Answer,
    Update,
    Score,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed)
    }

    /// Resolves the status that follows `action`.
    ///
    /// `Answer`, `Update`, and `Score` do not move the session; they only
    /// succeed in the statuses that accept them.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::AlreadyCompleted` for completing or updating a
    /// completed session, and `TransitionError::Illegal` for every other pair
    /// outside the transition table.
    pub fn apply(self, action: SessionAction) -> Result<SessionStatus, TransitionError> {
        use SessionAction as A;
        use SessionStatus as S;

        match (self, action) {
            (S::NotStarted, A::Start) => Ok(S::InProgress),
            (S::InProgress, A::Pause) => Ok(S::Paused),
            (S::Paused, A::Resume) => Ok(S::InProgress),
            (S::InProgress | S::Paused, A::Complete) => Ok(S::Completed),
            (S::InProgress, A::Answer) => Ok(S::InProgress),
            (S::Completed, A::Score) => Ok(S::Completed),
            (S::Completed, A::Complete | A::Update) => Err(TransitionError::AlreadyCompleted),
            (status, A::Update) => Ok(status),
            (from, action) => Err(TransitionError::Illegal { from, action }),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(SessionStateError::InvalidStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::Complete => "complete",
            SessionAction::Answer => "answer",
            SessionAction::Update => "update",
            SessionAction::Score => "score",
        };
        f.write_str(verb)
    }
}

//
// ─── MODE ─────────────────────────────────────────────────────────────────────
//

/// How the quiz is presented to the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    #[default]
    Tutor,
    Timed,
    Untimed,
    Practice,
    Review,
}

impl QuizMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Tutor => "tutor",
            QuizMode::Timed => "timed",
            QuizMode::Untimed => "untimed",
            QuizMode::Practice => "practice",
            QuizMode::Review => "review",
        }
    }

    /// Only timed quizzes carry an overall time limit.
    #[must_use]
    pub fn has_time_limit(self) -> bool {
        matches!(self, QuizMode::Timed)
    }
}

impl FromStr for QuizMode {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tutor" => Ok(Self::Tutor),
            "timed" => Ok(Self::Timed),
            "untimed" => Ok(Self::Untimed),
            "practice" => Ok(Self::Practice),
            "review" => Ok(Self::Review),
            other => Err(SessionStateError::InvalidMode(other.to_owned())),
        }
    }
}

//
// ─── CONFIGURATION ────────────────────────────────────────────────────────────
//

/// Source selectors chosen at quiz setup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSelection {
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    #[serde(default)]
    pub question_sets: Vec<QuestionSetId>,
}

impl SourceSelection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.tags.is_empty() && self.question_sets.is_empty()
    }

    /// Sorts and deduplicates every selector list.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.categories.sort_unstable();
        self.categories.dedup();
        self.tags.sort_unstable();
        self.tags.dedup();
        self.question_sets.sort_unstable();
        self.question_sets.dedup();
        self
    }
}

/// Inclusive bounds on the requested question count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCountBounds {
    pub min: u32,
    pub max: u32,
}

impl Default for QuestionCountBounds {
    fn default() -> Self {
        Self { min: 1, max: 100 }
    }
}

impl QuestionCountBounds {
    #[must_use]
    pub fn contains(&self, count: u32) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// Caller-supplied configuration for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub title: String,
    pub mode: QuizMode,
    pub question_count: u32,
    pub sources: SourceSelection,
    /// `None` means mixed difficulty.
    pub difficulty: Option<Difficulty>,
    pub shuffle: bool,
}

impl SessionConfig {
    /// Validate the configuration against the given count bounds.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError` when no source is selected, the count is
    /// out of bounds, or the title is too long.
    pub fn validate(&self, bounds: QuestionCountBounds) -> Result<(), SessionConfigError> {
        if self.sources.is_empty() {
            return Err(SessionConfigError::NoSource);
        }
        if !bounds.contains(self.question_count) {
            return Err(SessionConfigError::CountOutOfBounds {
                count: self.question_count,
                min: bounds.min,
                max: bounds.max,
            });
        }
        normalize_title(&self.title).map(|_| ())
    }
}

fn normalize_title(raw: &str) -> Result<String, SessionConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_TITLE.to_owned());
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(SessionConfigError::TitleTooLong { max: MAX_TITLE_LEN });
    }
    Ok(trimmed.to_owned())
}

/// General field update for a session that has not completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub title: Option<String>,
    pub time_remaining_secs: Option<u32>,
}

impl SessionPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.time_remaining_secs.is_none()
    }
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Correct answers over the size of the frozen question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl Score {
    /// `correct` is capped at `total`.
    #[must_use]
    pub fn new(correct: u32, total: u32) -> Self {
        Self {
            correct: correct.min(total),
            total,
        }
    }

    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.correct) / f64::from(self.total)
    }

    /// Score as a whole percentage, rounded half away from zero.
    #[must_use]
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let scaled = u64::from(self.correct) * 200 + u64::from(self.total);
        let rounded = scaled / (u64::from(self.total) * 2);
        u32::try_from(rounded).unwrap_or(100)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.correct, self.total)
    }
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// Storage shape of a session. Every field is plain data so adapters can map
/// rows without reaching into the domain type.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub id: SessionId,
    pub owner: UserId,
    pub title: String,
    pub mode: QuizMode,
    pub question_count: u32,
    pub sources: SourceSelection,
    pub difficulty: Option<Difficulty>,
    pub shuffle: bool,
    pub question_ids: Vec<QuestionId>,
    pub status: SessionStatus,
    pub time_limit_secs: Option<u32>,
    pub time_remaining_secs: Option<u32>,
    pub paused_secs: u32,
    pub total_time_spent_secs: Option<u32>,
    pub correct_answers: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One user's attempt at a quiz: a frozen question list plus progress state.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    id: SessionId,
    owner: UserId,
    config: SessionConfig,
    question_ids: Vec<QuestionId>,
    status: SessionStatus,
    time_limit_secs: Option<u32>,
    time_remaining_secs: Option<u32>,
    paused_secs: u32,
    total_time_spent_secs: Option<u32>,
    correct_answers: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    paused_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuizSession {
    /// Create a `not_started` session over an already-selected question list.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::EmptyPool` if `question_ids` is empty and
    /// `SessionConfigError::TitleTooLong` for oversized titles.
    pub fn new(
        id: SessionId,
        owner: UserId,
        mut config: SessionConfig,
        question_ids: Vec<QuestionId>,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionConfigError> {
        if question_ids.is_empty() {
            return Err(SessionConfigError::EmptyPool);
        }
        config.title = normalize_title(&config.title)?;
        config.sources = config.sources.normalized();

        let total = u32::try_from(question_ids.len()).unwrap_or(u32::MAX);
        let time_limit_secs = config
            .mode
            .has_time_limit()
            .then(|| total.saturating_mul(TIMED_SECONDS_PER_QUESTION));

        Ok(Self {
            id,
            owner,
            config,
            question_ids,
            status: SessionStatus::NotStarted,
            time_limit_secs,
            time_remaining_secs: time_limit_secs,
            paused_secs: 0,
            total_time_spent_secs: None,
            correct_answers: None,
            started_at: None,
            paused_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the stored fields contradict the status.
    pub fn from_persisted(p: PersistedSession) -> Result<Self, SessionStateError> {
        if p.question_ids.is_empty() {
            return Err(SessionStateError::EmptyQuestionList);
        }
        let missing = |field| SessionStateError::MissingField {
            status: p.status,
            field,
        };
        if matches!(
            p.status,
            SessionStatus::InProgress | SessionStatus::Paused | SessionStatus::Completed
        ) && p.started_at.is_none()
        {
            return Err(missing("started_at"));
        }
        if p.status == SessionStatus::Paused && p.paused_at.is_none() {
            return Err(missing("paused_at"));
        }
        if p.status == SessionStatus::Completed {
            if p.completed_at.is_none() {
                return Err(missing("completed_at"));
            }
            if p.correct_answers.is_none() {
                return Err(missing("correct_answers"));
            }
        }

        Ok(Self {
            id: p.id,
            owner: p.owner,
            config: SessionConfig {
                title: p.title,
                mode: p.mode,
                question_count: p.question_count,
                sources: p.sources,
                difficulty: p.difficulty,
                shuffle: p.shuffle,
            },
            question_ids: p.question_ids,
            status: p.status,
            time_limit_secs: p.time_limit_secs,
            time_remaining_secs: p.time_remaining_secs,
            paused_secs: p.paused_secs,
            total_time_spent_secs: p.total_time_spent_secs,
            correct_answers: p.correct_answers,
            started_at: p.started_at,
            paused_at: p.paused_at,
            completed_at: p.completed_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
    }

    #[must_use]
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            id: self.id,
            owner: self.owner,
            title: self.config.title.clone(),
            mode: self.config.mode,
            question_count: self.config.question_count,
            sources: self.config.sources.clone(),
            difficulty: self.config.difficulty,
            shuffle: self.config.shuffle,
            question_ids: self.question_ids.clone(),
            status: self.status,
            time_limit_secs: self.time_limit_secs,
            time_remaining_secs: self.time_remaining_secs,
            paused_secs: self.paused_secs,
            total_time_spent_secs: self.total_time_spent_secs,
            correct_answers: self.correct_answers,
            started_at: self.started_at,
            paused_at: self.paused_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.config.title
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.config.mode
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    /// Size of the frozen question list; the score denominator.
    #[must_use]
    pub fn total_questions(&self) -> u32 {
        u32::try_from(self.question_ids.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn contains_question(&self, question_id: QuestionId) -> bool {
        self.question_ids.contains(&question_id)
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn time_remaining_secs(&self) -> Option<u32> {
        self.time_remaining_secs
    }

    #[must_use]
    pub fn paused_secs(&self) -> u32 {
        self.paused_secs
    }

    #[must_use]
    pub fn total_time_spent_secs(&self) -> Option<u32> {
        self.total_time_spent_secs
    }

    /// Final score; present only once completed.
    #[must_use]
    pub fn score(&self) -> Option<Score> {
        self.correct_answers
            .map(|correct| Score::new(correct, self.total_questions()))
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn paused_at(&self) -> Option<DateTime<Utc>> {
        self.paused_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// `not_started → in_progress`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any other status.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.apply(SessionAction::Start)?;
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `in_progress → paused`, recording the client-reported time remaining.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any other status.
    pub fn pause(
        &mut self,
        time_remaining_secs: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.status = self.status.apply(SessionAction::Pause)?;
        if let Some(remaining) = time_remaining_secs {
            self.time_remaining_secs = Some(self.clamp_remaining(remaining));
        }
        self.paused_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// `paused → in_progress`; the pause interval is measured on `now`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any other status.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.apply(SessionAction::Resume)?;
        self.close_pause(now);
        self.updated_at = now;
        Ok(())
    }

    /// Checks that answers may be recorded right now.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Illegal` unless the session is in progress.
    pub fn ensure_accepts_answers(&self) -> Result<(), TransitionError> {
        self.status.apply(SessionAction::Answer).map(|_| ())
    }

    /// Final score of a completed session.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::Illegal` until the session is completed.
    pub fn final_score(&self) -> Result<Score, TransitionError> {
        self.status.apply(SessionAction::Score)?;
        self.score().ok_or(TransitionError::Illegal {
            from: self.status,
            action: SessionAction::Score,
        })
    }

    /// `in_progress | paused → completed`.
    ///
    /// `answered_secs` is the sum of per-attempt time; tracked pause time is
    /// added on top to form the total time spent.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError::AlreadyCompleted` on a second completion.
    pub fn complete(
        &mut self,
        correct_answers: u32,
        answered_secs: u32,
        now: DateTime<Utc>,
    ) -> Result<Score, TransitionError> {
        self.status = self.status.apply(SessionAction::Complete)?;
        self.close_pause(now);

        let score = Score::new(correct_answers, self.total_questions());
        self.correct_answers = Some(score.correct);
        self.total_time_spent_secs = Some(answered_secs.saturating_add(self.paused_secs));
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(score)
    }

    /// Apply a general field update.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::Transition` once the session is completed and
    /// `UpdateError::Config` for an oversized title.
    pub fn update(&mut self, patch: SessionPatch, now: DateTime<Utc>) -> Result<(), UpdateError> {
        self.status.apply(SessionAction::Update)?;
        if let Some(title) = patch.title {
            self.config.title = normalize_title(&title)?;
        }
        if let Some(remaining) = patch.time_remaining_secs {
            self.time_remaining_secs = Some(self.clamp_remaining(remaining));
        }
        self.updated_at = now;
        Ok(())
    }

    fn clamp_remaining(&self, remaining: u32) -> u32 {
        self.time_limit_secs
            .map_or(remaining, |limit| remaining.min(limit))
    }

    fn close_pause(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_secs = self
                .paused_secs
                .saturating_add(elapsed_secs(paused_at, now));
        }
    }
}

/// Failure of [`QuizSession::update`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Config(#[from] SessionConfigError),
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
