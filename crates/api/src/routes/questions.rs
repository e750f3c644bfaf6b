use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

use quiz_core::model::{Capability, QuestionDraft, QuestionId};
use services::Caller;

use crate::dto::{QuestionView, ReviewBody};
use crate::envelope::Reply;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, AuthCaller};
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/questions", post(author_question))
        .route("/questions/{id}", get(get_question))
        .route("/questions/{id}/review", post(review_question))
}

/// Correct flags are only shown to roles that write or review questions.
fn reveals_answers(caller: &Caller) -> bool {
    caller.can(Capability::AuthorQuestions) || caller.can(Capability::ReviewQuestions)
}

async fn author_question(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiJson(draft): ApiJson<QuestionDraft>,
) -> Result<Reply<QuestionView>, ApiError> {
    let question = state
        .services
        .questions()
        .author_question(&caller, draft)
        .await?;
    Ok(Reply::created(QuestionView::new(&question, true)))
}

async fn get_question(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QuestionId>,
) -> Result<Reply<QuestionView>, ApiError> {
    let question = state.services.questions().get_question(&caller, id).await?;
    Ok(Reply::ok(QuestionView::new(
        &question,
        reveals_answers(&caller),
    )))
}

async fn review_question(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<QuestionId>,
    ApiJson(body): ApiJson<ReviewBody>,
) -> Result<Reply<QuestionView>, ApiError> {
    let question = state
        .services
        .questions()
        .review_question(&caller, id, body.action)
        .await?;
    Ok(Reply::ok(QuestionView::new(&question, true)))
}
