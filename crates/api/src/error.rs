use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use services::{QuestionServiceError, SessionError, StatsError};

use crate::envelope::Envelope;

/// Every failure a handler can return, already classified by status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("missing or invalid caller identity")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(Envelope::error(self.to_string()))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Forbidden => ApiError::Forbidden,
            SessionError::NotFound => ApiError::NotFound("session not found".into()),
            SessionError::QuestionNotFound => ApiError::NotFound("question not found".into()),
            SessionError::Storage(cause) => {
                error!(error = %cause, "session storage failure");
                ApiError::Internal
            }
            SessionError::InvalidConfiguration(_)
            | SessionError::InvalidTransition(_)
            | SessionError::DuplicateAnswer
            | SessionError::AlreadyCompleted
            | SessionError::InvalidAnswer(_) => ApiError::BadRequest(e.to_string()),
            other => {
                error!(error = %other, "unclassified session error");
                ApiError::Internal
            }
        }
    }
}

impl From<QuestionServiceError> for ApiError {
    fn from(e: QuestionServiceError) -> Self {
        match e {
            QuestionServiceError::Forbidden => ApiError::Forbidden,
            QuestionServiceError::NotFound => ApiError::NotFound("question not found".into()),
            QuestionServiceError::Invalid(_) | QuestionServiceError::InvalidTransition(_) => {
                ApiError::BadRequest(e.to_string())
            }
            QuestionServiceError::Storage(cause) => {
                error!(error = %cause, "question storage failure");
                ApiError::Internal
            }
            other => {
                error!(error = %other, "unclassified question error");
                ApiError::Internal
            }
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(e: StatsError) -> Self {
        error!(error = %e, "stats lookup failed");
        ApiError::Internal
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{SessionAction, SessionStatus, TransitionError};
    use storage::StorageError;

    #[test]
    fn session_errors_map_to_status_codes() {
        let cases = [
            (SessionError::Forbidden, StatusCode::FORBIDDEN),
            (SessionError::NotFound, StatusCode::NOT_FOUND),
            (SessionError::QuestionNotFound, StatusCode::NOT_FOUND),
            (SessionError::DuplicateAnswer, StatusCode::BAD_REQUEST),
            (SessionError::AlreadyCompleted, StatusCode::BAD_REQUEST),
            (
                SessionError::InvalidTransition(TransitionError::Illegal {
                    from: SessionStatus::NotStarted,
                    action: SessionAction::Pause,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::Storage(StorageError::Connection("pool closed".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_stay_opaque() {
        let err = ApiError::from(SessionError::Storage(StorageError::Serialization(
            "bad uuid blob".into(),
        )));
        assert_eq!(err.to_string(), "internal server error");
    }
}
