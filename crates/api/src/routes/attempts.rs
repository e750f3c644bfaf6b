use axum::extract::State;
use axum::routing::post;
use axum::Router;

use quiz_core::model::{AnswerSubmission, QuizAttempt};
use services::BatchOutcome;

use crate::dto::{AttemptsQuery, SubmitAttemptBody, SubmitBatchBody};
use crate::envelope::Reply;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery, AuthCaller};
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/attempts", post(submit_attempt).get(list_attempts))
        .route("/attempts/batch", post(submit_batch))
}

async fn submit_attempt(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitAttemptBody>,
) -> Result<Reply<QuizAttempt>, ApiError> {
    let attempt = state
        .services
        .sessions()
        .submit_answer(&caller, body.session_id, body.answer.into())
        .await?;
    Ok(Reply::created(attempt))
}

async fn submit_batch(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitBatchBody>,
) -> Result<Reply<BatchOutcome>, ApiError> {
    let answers: Vec<AnswerSubmission> = body.answers.into_iter().map(Into::into).collect();
    let outcome = state
        .services
        .sessions()
        .submit_answers_batch(&caller, body.session_id, answers)
        .await?;
    Ok(Reply::created(outcome))
}

async fn list_attempts(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AttemptsQuery>,
) -> Result<Reply<Vec<QuizAttempt>>, ApiError> {
    let attempts = state
        .services
        .sessions()
        .list_attempts(&caller, query.session_id)
        .await?;
    Ok(Reply::ok(attempts))
}
