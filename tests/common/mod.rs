// In-process harness: drives the real router with tower's oneshot
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use arena_ledger::auth::SUBJECT_HEADER;
use arena_ledger::handlers::SETTLEMENT_KEY_HEADER;
use arena_ledger::{build_router, AppState, Config, LedgerStore, MemoryStore, Profile, SharedState};

pub const SETTLEMENT_KEY: &str = "test-settlement-key";

pub struct TestApp {
    pub state: SharedState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config {
            settlement_key: Some(SETTLEMENT_KEY.to_string()),
            ..Config::default()
        })
    }

    pub fn with_config(config: Config) -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        Self {
            state: AppState::new(config, store).shared(),
        }
    }

    /// Insert a profile with an exact balance, bypassing registration
    pub fn seed(&self, username: &str, balance: u64) -> Profile {
        let profile = Profile::new(subject(username), username.to_string(), None, balance);
        self.state
            .store
            .insert_profile(&profile)
            .expect("seed profile");
        profile
    }

    pub fn balance(&self, profile: &Profile) -> u64 {
        self.state.ledger.get(profile.id).expect("profile").balance
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(username) = caller {
            request = request.header(SUBJECT_HEADER, subject(username));
        }
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request");

        send(&self.state, request).await
    }

    /// Raw response for endpoints whose body never completes on its own
    pub async fn open(&self, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
        build_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, caller: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, caller, None).await
    }

    pub async fn post(&self, uri: &str, caller: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(caller), Some(body)).await
    }

    pub async fn settle(&self, bet_id: Uuid, winner: Uuid, key: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(format!("/bets/{}/settle", bet_id))
            .header("content-type", "application/json");
        if let Some(key) = key {
            request = request.header(SETTLEMENT_KEY_HEADER, key);
        }
        let body = serde_json::json!({ "winner": winner }).to_string();
        send(&self.state, request.body(Body::from(body)).expect("request")).await
    }
}

/// Subject id used for a seeded or registered username
pub fn subject(username: &str) -> String {
    format!("sub-{}", username)
}

async fn send(state: &SharedState, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone())
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, json)
}
