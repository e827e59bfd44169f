mod common;

use axum::body::{Body, BodyDataStream};
use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

use common::TestApp;

const WAIT: Duration = Duration::from_secs(5);

/// Reads server-sent frames off a response body
struct FeedFrames {
    body: BodyDataStream,
    buffer: String,
}

impl FeedFrames {
    fn new(body: Body) -> Self {
        Self {
            body: body.into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next `feed` event's data, or None once the stream has ended
    async fn next_feed(&mut self) -> Option<Value> {
        loop {
            while let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                if let Some(data) = feed_data(&frame) {
                    return Some(serde_json::from_str(&data).expect("feed data is json"));
                }
            }
            let chunk = timeout(WAIT, self.body.next()).await.expect("stream stalled")?;
            self.buffer
                .push_str(std::str::from_utf8(&chunk.expect("chunk")).expect("utf8"));
        }
    }

    /// True when the body ends before any further feed event
    async fn ended(&mut self) -> bool {
        timeout(WAIT, self.next_feed()).await.expect("stream stalled").is_none()
    }
}

fn feed_data(frame: &str) -> Option<String> {
    let mut is_feed = false;
    let mut data = Vec::new();
    for line in frame.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            is_feed = name.trim() == "feed";
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.trim_start());
        }
    }
    is_feed.then(|| data.join("\n"))
}

#[tokio::test]
async fn test_events_stream_refreshed_feed() {
    let app = TestApp::new();
    app.seed("alice", 500);
    let (status, _) = app
        .post("/bets", "alice", json!({ "description": "Knicks ML", "amount": 40 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app.open("/events").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap_or_default()
        .starts_with("text/event-stream"));
    let mut frames = FeedFrames::new(response.into_body());

    let initial = frames.next_feed().await.expect("initial snapshot");
    let initial = initial.as_array().expect("feed is a list");
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0]["description"], "Knicks ML");

    let (status, body) = app
        .post("/bets", "alice", json!({ "description": "Suns -2 vs Jazz", "amount": 60 }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let refreshed = frames.next_feed().await.expect("refreshed snapshot");
    let refreshed = refreshed.as_array().expect("feed is a list");
    assert_eq!(refreshed.len(), 2);
    assert!(refreshed.iter().any(|card| card["id"] == body["bet"]["id"]));

    app.state.begin_shutdown();
    assert!(frames.ended().await);
}

#[tokio::test]
async fn test_cancel_shows_up_as_removal() {
    let app = TestApp::new();
    app.seed("alice", 500);
    let (_, body) = app
        .post("/bets", "alice", json!({ "description": "Mavs +1", "amount": 10 }))
        .await;
    let bet_id = body["bet"]["id"].as_str().expect("bet id").to_string();

    let mut frames = FeedFrames::new(app.open("/events").await.into_body());
    assert_eq!(frames.next_feed().await.expect("snapshot").as_array().map(Vec::len), Some(1));

    let (status, _) = app
        .post(&format!("/bets/{}/cancel", bet_id), "alice", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(frames.next_feed().await.expect("snapshot").as_array().map(Vec::len), Some(0));

    app.state.begin_shutdown();
    assert!(frames.ended().await);
}
