#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    AttemptRepository, InMemoryRepository, PoolFilter, QuestionRepository, SessionQuery,
    SessionRepository, StatsRepository, Storage, StorageError,
};
