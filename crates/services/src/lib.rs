#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod guard;
pub mod questions;
pub mod sessions;
pub mod stats;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use error::{
    AnswerRejection, AppServicesError, QuestionServiceError, SessionError, StatsError,
};
pub use guard::{AccessDenied, Caller};
pub use questions::QuestionService;
pub use sessions::{
    BatchOutcome, ListSessions, QuizSessionService, SessionLimits, SessionResults,
};
pub use stats::{CategoryAccuracy, StatsAggregator, UserStats};
