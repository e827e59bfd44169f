// HTTP request handlers for the Arena API

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

use crate::app_state::SharedState;
use crate::auth::Actor;
use crate::bookie::BookieDraft;
use crate::errors::BetError;
use crate::extract::{PathParam, Payload, QueryParams};
use crate::feed::{page_limit, MineTab};
use crate::models::*;
use crate::notify::FeedWatcher;

pub const SETTLEMENT_KEY_HEADER: &str = "x-settlement-key";

pub async fn health_check() -> &'static str {
    "Arena Ledger - Online"
}

// ===== FEEDS =====

/// GET /bets
pub async fn get_bets(
    State(state): State<SharedState>,
    QueryParams(query): QueryParams<FeedQuery>,
) -> Result<Json<Value>, BetError> {
    let offset = query.offset.unwrap_or(0);
    let limit = page_limit(query.limit);
    let bets = state.feed.public_cards(offset, Some(limit))?;

    Ok(Json(json!({
        "success": true,
        "count": bets.len(),
        "offset": offset,
        "limit": limit,
        "bets": bets
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct MineQuery {
    pub tab: Option<MineTab>,
}

/// GET /bets/mine
/// With `tab` returns that tab only, otherwise both
pub async fn get_my_bets(
    State(state): State<SharedState>,
    Actor(profile): Actor,
    QueryParams(query): QueryParams<MineQuery>,
) -> Result<Json<Value>, BetError> {
    if let Some(tab) = query.tab {
        let bets = state.feed.mine_cards(profile.id, tab)?;
        return Ok(Json(json!({
            "success": true,
            "tab": tab,
            "count": bets.len(),
            "bets": bets
        })));
    }

    let mine = state.feed.mine_feed(profile.id).partition()?;
    Ok(Json(json!({
        "success": true,
        "active": state.feed.cards(mine.active)?,
        "history": state.feed.cards(mine.history)?
    })))
}

/// GET /bets/:id
pub async fn get_bet(
    State(state): State<SharedState>,
    PathParam(bet_id): PathParam<Uuid>,
) -> Result<Json<Value>, BetError> {
    let bet = state.registry.get(bet_id)?;
    let card = state.feed.card(bet)?;
    Ok(Json(json!({ "success": true, "bet": card })))
}

// ===== LIFECYCLE =====

/// POST /bets
pub async fn create_bet(
    State(state): State<SharedState>,
    Actor(profile): Actor,
    Payload(payload): Payload<CreateBetRequest>,
) -> Result<(StatusCode, Json<Value>), BetError> {
    let bet = state.lifecycle.create(profile.id, &payload)?;
    let card = state.feed.card(bet)?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "bet": card }))))
}

/// POST /bets/:id/accept
pub async fn accept_bet(
    State(state): State<SharedState>,
    Actor(profile): Actor,
    PathParam(bet_id): PathParam<Uuid>,
) -> Result<Json<Value>, BetError> {
    let bet = state.lifecycle.accept(bet_id, profile.id)?;
    let card = state.feed.card(bet)?;
    Ok(Json(json!({ "success": true, "bet": card })))
}

/// POST /bets/:id/cancel
pub async fn cancel_bet(
    State(state): State<SharedState>,
    Actor(profile): Actor,
    PathParam(bet_id): PathParam<Uuid>,
) -> Result<Json<Value>, BetError> {
    let bet = state.lifecycle.cancel(bet_id, profile.id)?;
    let card = state.feed.card(bet)?;
    Ok(Json(json!({ "success": true, "bet": card })))
}

/// POST /bets/:id/settle
/// Outcome reporting is external; callers prove it with the shared settlement key.
pub async fn settle_bet(
    State(state): State<SharedState>,
    headers: HeaderMap,
    PathParam(bet_id): PathParam<Uuid>,
    Payload(payload): Payload<SettleRequest>,
) -> Result<Json<Value>, BetError> {
    let expected = state
        .config
        .settlement_key
        .as_deref()
        .ok_or_else(|| BetError::Unauthorized("settlement is disabled".into()))?;
    let presented = headers
        .get(SETTLEMENT_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected) {
        warn!(bet_id = %bet_id, "settlement attempt with a bad key");
        return Err(BetError::Unauthorized("invalid settlement key".into()));
    }

    let settled = state.lifecycle.settle(bet_id, payload.winner)?;
    let card = state.feed.card(settled.bet)?;
    Ok(Json(json!({
        "success": true,
        "bet": card,
        "winner": ProfileResponse::from(settled.winner),
        "loser": ProfileResponse::from(settled.loser)
    })))
}

// ===== BOOKIE =====

/// GET /games
pub async fn get_games(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "count": state.games.len(),
        "games": state.games
    }))
}

/// POST /games/:id/bets
/// Runs the whole bookie slip in one request and posts the result
pub async fn create_game_bet(
    State(state): State<SharedState>,
    Actor(profile): Actor,
    PathParam(game_id): PathParam<String>,
    Payload(payload): Payload<SpreadBetRequest>,
) -> Result<(StatusCode, Json<Value>), BetError> {
    let game = state.game(&game_id)?.clone();

    let mut draft = BookieDraft::new(game);
    draft.pick_team(&payload.team)?;
    draft.set_spread(&payload.spread)?;
    draft.set_stake(payload.stake, profile.balance)?;
    let request = draft.confirm()?;

    let bet = state.lifecycle.create(profile.id, &request)?;
    let card = state.feed.card(bet)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "bet": card,
            "challenge_text": draft.challenge_text()?
        })),
    ))
}

// ===== REALTIME =====

/// GET /events
/// Server-sent `feed` events, each carrying the whole refreshed public feed
pub async fn feed_events(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, BetError> {
    let watcher = FeedWatcher::new(state.feed.clone(), &state.notifier)?;

    let events = stream::unfold((watcher, true), |(mut watcher, first)| async move {
        if !first {
            loop {
                match watcher.changed().await? {
                    Ok(()) => break,
                    Err(err) => warn!(error = %err, "feed refresh failed, waiting for the next change"),
                }
            }
        }
        let event = feed_event(watcher.snapshot());
        Some((Ok::<_, Infallible>(event), (watcher, false)))
    });

    let events = events.take_until(state.on_shutdown());
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn feed_event(snapshot: &[BetCard]) -> Event {
    Event::default()
        .event("feed")
        .json_data(snapshot)
        .unwrap_or_else(|err| {
            warn!(error = %err, "could not encode feed snapshot");
            Event::default().event("error").data("feed unavailable")
        })
}
