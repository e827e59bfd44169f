// Routes module - assembles every HTTP endpoint into one router

pub mod profiles;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app_state::SharedState;
use crate::handlers::*;
use profiles::{get_my_profile, get_profile, register_profile};

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // ===== PROFILE ENDPOINTS =====
        .route("/profiles", post(register_profile))
        .route("/profiles/me", get(get_my_profile))
        .route("/profiles/:id", get(get_profile))

        // ===== BET ENDPOINTS =====
        .route("/bets", get(get_bets).post(create_bet))
        .route("/bets/mine", get(get_my_bets))
        .route("/bets/:id", get(get_bet))
        .route("/bets/:id/accept", post(accept_bet))
        .route("/bets/:id/cancel", post(cancel_bet))
        .route("/bets/:id/settle", post(settle_bet))

        // ===== BOOKIE ENDPOINTS =====
        .route("/games", get(get_games))
        .route("/games/:id/bets", post(create_game_bet))

        // ===== REALTIME =====
        .route("/events", get(feed_events))

        // ===== HEALTH CHECK =====
        .route("/", get(health_check))
        .route("/health", get(health_check))

        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
