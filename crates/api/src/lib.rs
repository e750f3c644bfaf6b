#![forbid(unsafe_code)]

pub mod config;
pub mod dto;
pub mod envelope;
pub mod error;
pub mod extract;
mod routes;

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use services::AppServices;

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

/// Build the HTTP router with request tracing and a per-request timeout.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    routes::routes()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
