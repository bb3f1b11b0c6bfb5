// Telegram command loop driven against a local stand-in for the Bot API.

mod common;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::*;
use livecoach::advisory::Advisor;
use livecoach::notify::{bot, Notifier};
use livecoach::transcript::TranscriptSource;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Records every sendMessage text and hands out scripted updates once.
#[derive(Clone, Default)]
struct TelegramStub {
    sent: Arc<Mutex<Vec<String>>>,
    updates: Arc<Mutex<Vec<Value>>>,
}

impl TelegramStub {
    fn push_update(&self, id: i64, chat: i64, text: &str) {
        self.updates.lock().unwrap().push(json!({
            "update_id": id,
            "message": { "chat": { "id": chat }, "text": text },
        }));
    }

    fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

async fn get_updates(State(stub): State<TelegramStub>, Path(_bot): Path<String>) -> Json<Value> {
    let batch: Vec<Value> = stub.updates.lock().unwrap().drain(..).collect();
    if batch.is_empty() {
        // Long poll: stall so the loop does not spin between batches.
        sleep(Duration::from_secs(5)).await;
    }
    Json(json!({ "ok": true, "result": batch }))
}

async fn send_message(
    State(stub): State<TelegramStub>,
    Path(_bot): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if let Some(text) = body.get("text").and_then(Value::as_str) {
        stub.sent.lock().unwrap().push(text.to_string());
    }
    Json(json!({ "ok": true }))
}

async fn serve_stub(stub: TelegramStub) -> String {
    let app = Router::new()
        .route("/:bot/getUpdates", get(get_updates))
        .route("/:bot/sendMessage", post(send_message))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn wait_for_reply(stub: &TelegramStub, needle: &str) -> bool {
    for _ in 0..100 {
        if stub.sent_texts().iter().any(|t| t.contains(needle)) {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}

fn spawn_bot(api_url: String) {
    let notifier = Arc::new(Notifier::new("test-token".to_string(), None).with_api_url(api_url));
    let source = FakeSource::new();
    let advisor = FakeAdvisor::silent();
    let registry = make_registry(&source, &advisor, quiet_supervisor(), test_limits());
    tokio::spawn(bot::run(
        notifier,
        registry,
        source as Arc<dyn TranscriptSource>,
        advisor as Arc<dyn Advisor>,
    ));
}

#[tokio::test]
async fn bare_prep_replies_with_prepdata_format() {
    let stub = TelegramStub::default();
    stub.push_update(1, 42, "/prep");
    let api_url = serve_stub(stub.clone()).await;

    spawn_bot(api_url);

    assert!(
        wait_for_reply(&stub, "/prepdata <role>|<cv>|<jd>").await,
        "bare /prep should answer with the prepdata format"
    );
}

#[tokio::test]
async fn prepdata_without_all_parts_replies_with_format() {
    let stub = TelegramStub::default();
    stub.push_update(1, 42, "/prepdata backend engineer");
    let api_url = serve_stub(stub.clone()).await;

    spawn_bot(api_url);

    assert!(
        wait_for_reply(&stub, "Format: /prepdata <role>|<cv>|<jd>").await,
        "incomplete /prepdata should answer with the format"
    );
}

#[tokio::test]
async fn start_lists_the_commands() {
    let stub = TelegramStub::default();
    stub.push_update(1, 42, "/start");
    let api_url = serve_stub(stub.clone()).await;

    spawn_bot(api_url);

    assert!(wait_for_reply(&stub, "/connect <id>").await);
    let texts = stub.sent_texts();
    assert!(texts.iter().any(|t| t.contains("/prepdata <role>|<cv>|<jd>")));
}
