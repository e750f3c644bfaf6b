pub mod results;
pub mod selection;
mod service;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use results::{CategoryBreakdown, DifficultyBreakdown, SessionResults, Tally};
pub use service::{
    BatchOutcome, DEFAULT_PAGE_SIZE, ListSessions, MAX_PAGE_SIZE, QuizSessionService,
    SessionLimits,
};
