//! End-to-end bet lifecycle through the HTTP API
//!
//! Alice posts, Bob can't cover it, Carol takes it, Alice wins.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use tokio_test::assert_ok;
use uuid::Uuid;

use arena_ledger::{BetFilter, BetStatus, LedgerStore};
use common::{TestApp, SETTLEMENT_KEY};

fn id(value: &serde_json::Value) -> Uuid {
    value.as_str().and_then(|s| s.parse().ok()).expect("uuid")
}

#[tokio::test]
async fn test_alice_bob_carol_full_lifecycle() {
    let app = TestApp::new();
    let alice = app.seed("alice", 500);
    let bob = app.seed("bob", 50);
    let carol = app.seed("carol", 200);

    // ===== CREATE =====
    let (status, body) = app
        .post("/bets", "alice", json!({ "description": "Team X covers spread", "amount": 100 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["bet"]["status"], "open");
    assert_eq!(body["bet"]["opponent"], serde_json::Value::Null);
    assert_eq!(body["bet"]["creator_profile"]["username"], "alice");
    let bet_id = id(&body["bet"]["id"]);

    let (_, feed) = app.get("/bets", None).await;
    assert_eq!(feed["count"], 1);

    // ===== BOB CAN'T COVER =====
    let (status, body) = app.post(&format!("/bets/{}/accept", bet_id), "bob", json!({})).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "insufficient_balance");

    let (_, body) = app.get(&format!("/bets/{}", bet_id), None).await;
    assert_eq!(body["bet"]["status"], "open");

    // ===== CAROL TAKES IT =====
    let (status, body) = app.post(&format!("/bets/{}/accept", bet_id), "carol", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bet"]["status"], "matched");
    assert_eq!(id(&body["bet"]["opponent"]), carol.id);
    assert_eq!(body["bet"]["opponent_profile"]["username"], "carol");

    let (_, feed) = app.get("/bets", None).await;
    assert_eq!(feed["count"], 0);

    // ===== SETTLE FOR ALICE =====
    let (status, body) = app.settle(bet_id, alice.id, Some(SETTLEMENT_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bet"]["status"], "completed");
    assert_eq!(id(&body["bet"]["winner"]), alice.id);
    assert_eq!(body["winner"]["balance"], 600);
    assert_eq!(body["loser"]["balance"], 100);

    let (_, me) = app.get("/profiles/me", Some("alice")).await;
    assert_eq!(me["profile"]["balance"], 600);
    assert_eq!(me["profile"]["wins"], 1);
    assert_eq!(me["profile"]["win_rate"], 100);

    let (_, me) = app.get("/profiles/me", Some("carol")).await;
    assert_eq!(me["profile"]["balance"], 100);
    assert_eq!(me["profile"]["losses"], 1);
    assert_eq!(me["profile"]["games_played"], 1);

    assert_eq!(app.balance(&bob), 50);

    // ===== HISTORY =====
    let (_, mine) = app.get("/bets/mine?tab=history", Some("carol")).await;
    assert_eq!(mine["count"], 1);
    assert_eq!(mine["bets"][0]["status"], "completed");

    let (_, mine) = app.get("/bets/mine", Some("alice")).await;
    assert_eq!(mine["active"].as_array().map(Vec::len), Some(0));
    assert_eq!(mine["history"].as_array().map(Vec::len), Some(1));

    let settled = assert_ok!(app.state.store.query_bets(&BetFilter::involving(carol.id)));
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].status, BetStatus::Completed);
}

#[tokio::test]
async fn test_register_then_bet() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/profiles", "dana", json!({ "username": "dana_hoops" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["profile"]["balance"], 1000);
    assert_eq!(body["profile"]["win_rate"], 0);
    let dana = id(&body["profile"]["id"]);

    let (status, _) = app
        .post("/profiles", "dana", json!({ "username": "someone_else" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post("/bets", "dana", json!({ "description": "Heat ML", "amount": 250, "visibility": "friends" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // friends-only bets stay out of the public feed but show up in mine
    let (_, feed) = app.get("/bets", None).await;
    assert_eq!(feed["count"], 0);
    let (_, mine) = app.get("/bets/mine?tab=active", Some("dana")).await;
    assert_eq!(mine["count"], 1);

    let (status, profile) = app.get(&format!("/profiles/{}", dana), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["profile"]["balance"], 1000);
}

#[tokio::test]
async fn test_concurrent_accepts_over_http() {
    let app = TestApp::new();
    app.seed("maker", 1000);
    let (_, body) = app
        .post("/bets", "maker", json!({ "description": "Suns -3 vs Nuggets", "amount": 10 }))
        .await;
    let bet_id = id(&body["bet"]["id"]);

    let takers: Vec<String> = (0..6).map(|i| format!("taker{}", i)).collect();
    for taker in &takers {
        app.seed(taker, 100);
    }

    let uri = format!("/bets/{}/accept", bet_id);
    let results = futures::future::join_all(
        takers.iter().map(|taker| app.post(&uri, taker, json!({}))),
    )
    .await;

    let wins = results.iter().filter(|(s, _)| *s == StatusCode::OK).count();
    let lost = results
        .iter()
        .filter(|(s, b)| *s == StatusCode::CONFLICT && b["code"] == "already_matched")
        .count();
    assert_eq!(wins, 1);
    assert_eq!(lost, takers.len() - 1);
}
