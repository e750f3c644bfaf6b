use axum::Router;

use crate::AppState;

mod attempts;
mod health;
mod questions;
mod sessions;
mod stats;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(sessions::routes())
        .merge(attempts::routes())
        .merge(questions::routes())
        .merge(stats::routes())
}
