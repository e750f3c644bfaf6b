mod attempt;
mod ids;
mod question;
mod role;
mod session;
mod stats;

pub use ids::{
    AttemptId, CategoryId, OptionId, ParseIdError, QuestionId, QuestionSetId, SessionId, TagId,
    UserId,
};

pub use attempt::{AnswerSubmission, QuizAttempt};
pub use question::{
    Difficulty, OptionDraft, Question, QuestionDraft, QuestionError, QuestionOption,
    QuestionStatus, ReviewAction,
};
pub use role::{Capability, ParseRoleError, Role};
pub use session::{
    PersistedSession, QuestionCountBounds, QuizMode, QuizSession, Score, SessionAction,
    SessionConfig, SessionConfigError, SessionPatch, SessionStateError, SessionStatus,
    SourceSelection, TransitionError, UpdateError, DEFAULT_TITLE, MAX_TITLE_LEN,
    TIMED_SECONDS_PER_QUESTION,
};
pub use stats::{CategoryStats, CategoryTally};
