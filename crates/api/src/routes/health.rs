use axum::Router;
use axum::routing::get;
use serde::Serialize;

use crate::AppState;
use crate::envelope::Reply;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Reply<Health> {
    Reply::ok(Health { status: "ok" })
}
