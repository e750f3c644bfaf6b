use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;

use serde::Serialize;

use quiz_core::model::SessionId;
use services::{ListSessions, SessionResults};

use crate::dto::{
    CreateSessionBody, LifecycleAction, ListSessionsQuery, PatchSessionBody, SessionView,
};
use crate::envelope::Reply;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, AuthCaller};
use crate::AppState;

#[derive(Serialize)]
struct Deleted {
    id: SessionId,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route(
            "/sessions/{id}",
            get(get_session).patch(patch_session).delete(delete_session),
        )
        .route("/sessions/{id}/complete", post(complete_session))
        .route("/sessions/{id}/results", get(session_results))
}

async fn create_session(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateSessionBody>,
) -> Result<Reply<SessionView>, ApiError> {
    let session = state
        .services
        .sessions()
        .create_session(&caller, body.into())
        .await?;
    Ok(Reply::created(SessionView::from(&session)))
}

async fn list_sessions(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListSessionsQuery>,
) -> Result<Reply<Vec<SessionView>>, ApiError> {
    let request = ListSessions {
        status: query.status,
        limit: query.limit,
        offset: query.offset,
    };
    let sessions = state
        .services
        .sessions()
        .list_sessions(&caller, request)
        .await?;
    Ok(Reply::ok(sessions.iter().map(SessionView::from).collect()))
}

async fn get_session(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<Reply<SessionView>, ApiError> {
    let session = state.services.sessions().get_session(&caller, id).await?;
    Ok(Reply::ok(SessionView::from(&session)))
}

async fn patch_session(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SessionId>,
    ApiJson(body): ApiJson<PatchSessionBody>,
) -> Result<Reply<SessionView>, ApiError> {
    let sessions = state.services.sessions();
    let session = match body.action {
        Some(LifecycleAction::Start) => sessions.start_session(&caller, id).await?,
        Some(LifecycleAction::Pause) => {
            sessions
                .pause_session(&caller, id, body.time_remaining)
                .await?
        }
        Some(LifecycleAction::Resume) => sessions.resume_session(&caller, id).await?,
        None => {
            sessions
                .update_session(&caller, id, body.into_patch())
                .await?
        }
    };
    Ok(Reply::ok(SessionView::from(&session)))
}

async fn delete_session(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<Reply<Deleted>, ApiError> {
    state.services.sessions().delete_session(&caller, id).await?;
    Ok(Reply::ok(Deleted { id }))
}

async fn complete_session(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<Reply<SessionView>, ApiError> {
    let session = state
        .services
        .sessions()
        .complete_session(&caller, id)
        .await?;
    Ok(Reply::ok(SessionView::from(&session)))
}

async fn session_results(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<Reply<SessionResults>, ApiError> {
    let results = state
        .services
        .sessions()
        .session_results(&caller, id)
        .await?;
    Ok(Reply::ok(results))
}
