//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionError, SessionConfigError, TransitionError, UpdateError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::guard::AccessDenied;

/// Why a submitted answer was refused before anything was written.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRejection {
    #[error("question is not part of this session")]
    QuestionNotInSession,
    #[error("option does not belong to the question")]
    OptionNotInQuestion,
    #[error("batch contains no answers")]
    EmptyBatch,
}

/// Errors emitted by the quiz session lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error(transparent)]
    InvalidConfiguration(#[from] SessionConfigError),
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    InvalidTransition(TransitionError),
    #[error("question already answered in this session")]
    DuplicateAnswer,
    #[error("session already completed")]
    AlreadyCompleted,
    #[error("session not found")]
    NotFound,
    #[error("question not found")]
    QuestionNotFound,
    #[error("invalid answer: {0}")]
    InvalidAnswer(AnswerRejection),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<TransitionError> for SessionError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::AlreadyCompleted => SessionError::AlreadyCompleted,
            illegal @ TransitionError::Illegal { .. } => SessionError::InvalidTransition(illegal),
        }
    }
}

impl From<UpdateError> for SessionError {
    fn from(e: UpdateError) -> Self {
        match e {
            UpdateError::Transition(t) => t.into(),
            UpdateError::Config(c) => c.into(),
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => SessionError::NotFound,
            other => SessionError::Storage(other),
        }
    }
}

impl From<AnswerRejection> for SessionError {
    fn from(e: AnswerRejection) -> Self {
        SessionError::InvalidAnswer(e)
    }
}

impl From<AccessDenied> for SessionError {
    fn from(_: AccessDenied) -> Self {
        SessionError::Forbidden
    }
}

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error(transparent)]
    Invalid(QuestionError),
    #[error(transparent)]
    InvalidTransition(QuestionError),
    #[error("forbidden")]
    Forbidden,
    #[error("question not found")]
    NotFound,
    #[error(transparent)]
    Storage(StorageError),
}

impl From<QuestionError> for QuestionServiceError {
    fn from(e: QuestionError) -> Self {
        match e {
            review @ QuestionError::IllegalReview { .. } => Self::InvalidTransition(review),
            other => Self::Invalid(other),
        }
    }
}

impl From<StorageError> for QuestionServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

impl From<AccessDenied> for QuestionServiceError {
    fn from(_: AccessDenied) -> Self {
        Self::Forbidden
    }
}

/// Errors emitted by `StatsAggregator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StatsError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
