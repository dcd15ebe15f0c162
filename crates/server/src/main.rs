//! Polling server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use polling_api::AppState;
use polling_common::Config;
use polling_core::{PollLocks, PollService, StaticTokenAuthenticator, VoteService};
use polling_db::{
    MemoryPollStore, MemoryVoteLedger, PollStore, SqlPollStore, SqlVoteLedger, VoteLedger,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Pick the storage backend from configuration.
async fn storage(
    config: &Config,
) -> Result<(Arc<dyn PollStore>, Arc<dyn VoteLedger>), Box<dyn std::error::Error>> {
    let Some(ref database) = config.database else {
        warn!("No database configured, polls are kept in memory and lost on restart");
        return Ok((
            Arc::new(MemoryPollStore::new()),
            Arc::new(MemoryVoteLedger::new()),
        ));
    };

    let db = polling_db::init(database).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    polling_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);
    Ok((
        Arc::new(SqlPollStore::new(db.clone())),
        Arc::new(SqlVoteLedger::new(db)),
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polling=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting polling server...");

    // Load configuration
    let config = Config::load()?;

    let (store, ledger) = storage(&config).await?;

    let authenticator = StaticTokenAuthenticator::from_config(&config.auth);
    if authenticator.is_empty() {
        warn!("No API users configured, only anonymous polls can be voted on");
    }

    // Votes, updates and deletes of one poll share a lock
    let locks = PollLocks::new();
    let state = AppState {
        poll_service: PollService::new(store.clone(), ledger.clone(), locks.clone()),
        vote_service: VoteService::new(store, ledger, locks),
        authenticator: Arc::new(authenticator),
    };

    // Build router
    let app = polling_api::app(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
