use axum::extract::State;
use axum::routing::get;
use axum::Router;

use services::UserStats;

use crate::envelope::Reply;
use crate::error::ApiError;
use crate::extract::AuthCaller;
use crate::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/stats", get(user_stats))
}

async fn user_stats(
    AuthCaller(caller): AuthCaller,
    State(state): State<AppState>,
) -> Result<Reply<UserStats>, ApiError> {
    let stats = state.services.stats().user_stats(&caller).await?;
    Ok(Reply::ok(stats))
}
