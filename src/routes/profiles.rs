// Profile routes: registration and lookups

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app_state::SharedState;
use crate::auth::{Actor, Subject};
use crate::errors::BetError;
use crate::extract::{PathParam, Payload};
use crate::models::{ProfileResponse, RegisterRequest};

/// POST /profiles
/// Creates the caller's profile, funded with the starting balance
pub async fn register_profile(
    State(state): State<SharedState>,
    Subject(subject): Subject,
    Payload(payload): Payload<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), BetError> {
    let profile = state
        .ledger
        .register(&subject, &payload.username, payload.avatar)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "profile": ProfileResponse::from(profile)
        })),
    ))
}

/// GET /profiles/me
pub async fn get_my_profile(Actor(profile): Actor) -> Json<Value> {
    Json(json!({
        "success": true,
        "profile": ProfileResponse::from(profile)
    }))
}

/// GET /profiles/:id
pub async fn get_profile(
    State(state): State<SharedState>,
    PathParam(profile_id): PathParam<Uuid>,
) -> Result<Json<Value>, BetError> {
    let profile = state.ledger.get(profile_id)?;
    Ok(Json(json!({
        "success": true,
        "profile": ProfileResponse::from(profile)
    })))
}
