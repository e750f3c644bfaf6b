use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quiz_api::config::{Config, normalize_sqlite_url, prepare_sqlite_file};
use quiz_api::{AppState, router};
use services::{AppServices, Clock};

const DEFAULT_LOG_FILTER: &str = "quiz_api=info,services=info,tower_http=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let config = Config::parse();

    let db_url = normalize_sqlite_url(&config.database_url);
    // Migrations run on connect; the file only needs to exist.
    prepare_sqlite_file(&db_url)?;
    let limits = config.session_limits()?;
    let services = AppServices::new_sqlite(&db_url, Clock::default_clock(), limits).await?;

    let app = router(AppState { services }, config.request_timeout());
    let listener = TcpListener::bind(config.bind_address).await?;
    info!(address = %config.bind_address, database = %db_url, "quiz-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
