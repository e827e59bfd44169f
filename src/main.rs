// Arena Ledger - Main Entry Point
// Profiles, open bets, matching and settlement over HTTP

use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use arena_ledger::{build_router, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("arena_ledger=info,tower_http=info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "arena ledger failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let addr = config.bind_addr;

    let state: SharedState = AppState::open(config)?.shared();
    let shutdown_state = state.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "arena ledger listening");
    info!("endpoints:");
    info!("   POST /profiles            - register your profile");
    info!("   GET  /profiles/me         - your profile and record");
    info!("   GET  /profiles/:id        - any profile and record");
    info!("   GET  /bets                - public open bets (limit, offset)");
    info!("   POST /bets                - post a bet");
    info!("   GET  /bets/mine           - your bets (tab=active|history)");
    info!("   GET  /bets/:id            - one bet");
    info!("   POST /bets/:id/accept     - take the other side");
    info!("   POST /bets/:id/cancel     - withdraw an open bet");
    info!("   POST /bets/:id/settle     - declare the winner (settlement key)");
    info!("   GET  /games               - upcoming games");
    info!("   POST /games/:id/bets      - post a spread bet on a game");
    info!("   GET  /events              - live public feed (SSE)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_state.clone()))
        .await?;

    info!("saving state to disk");
    match shutdown_state.save_to_disk() {
        Ok(()) => info!("state saved"),
        Err(e) => warn!(error = %e, "failed to save state"),
    }
    Ok(())
}

async fn shutdown_signal(state: SharedState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
    state.begin_shutdown();
}
