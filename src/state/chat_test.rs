use super::*;
use crate::config::ClientConfig;
use crate::net::test_helpers::{echo_chat_router, spawn_server};
use crate::net::types::Timestamp;
use axum::Json;
use axum::Router;
use axum::routing::{get, post};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

fn message(id: &str, content: &str) -> Message {
    Message {
        id: id.into(),
        content: content.into(),
        sender_id: "u1".into(),
        conversation_id: "c1".into(),
        created_at: Timestamp::default(),
    }
}

fn state_with(contents: &[&str]) -> ChatState {
    ChatState {
        messages: contents.iter().enumerate().map(|(i, c)| message(&i.to_string(), c)).collect(),
        ..ChatState::default()
    }
}

fn contents(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.content.as_str()).collect()
}

// =============================================================================
// ChatState
// =============================================================================

#[test]
fn history_is_shown_oldest_first() {
    let mut state = ChatState::default();
    state.apply_history(vec![message("3", "newest"), message("2", "middle"), message("1", "oldest")], 50);
    assert_eq!(contents(&state.messages), ["oldest", "middle", "newest"]);
}

#[test]
fn history_limit_keeps_newest() {
    let mut state = ChatState::default();
    state.apply_history(vec![message("3", "c"), message("2", "b"), message("1", "a")], 2);
    assert_eq!(contents(&state.messages), ["b", "c"]);
}

#[test]
fn envelopes_are_not_displayed() {
    let mut state = state_with(&["hi"]);
    state.apply_frame(ChatFrame::Envelope(json!("user joined")));
    state.apply_frame(ChatFrame::Message(message("9", "there")));
    assert_eq!(contents(&state.messages), ["hi", "there"]);
}

#[test]
fn search_is_case_insensitive_and_wraps() {
    let mut state = state_with(&["Deploy today", "lunch?", "deploy done", "DEPLOY again"]);

    assert_eq!(state.search("deploy"), 3);
    assert_eq!(state.search.results, [0, 2, 3]);
    assert_eq!(state.current_match(), Some(0));
    assert_eq!(state.next_match(), Some(2));
    assert_eq!(state.next_match(), Some(3));
    assert_eq!(state.next_match(), Some(0));
    assert_eq!(state.prev_match(), Some(3));
}

#[test]
fn blank_or_missing_search_has_no_cursor() {
    let mut state = state_with(&["one", "two"]);
    assert_eq!(state.search("   "), 0);
    assert_eq!(state.next_match(), None);

    assert_eq!(state.search("three"), 0);
    assert_eq!(state.current_match(), None);
    assert_eq!(state.prev_match(), None);

    state.search("one");
    state.clear_search();
    assert_eq!(state.search, SearchState::default());
}

// =============================================================================
// ChatSession
// =============================================================================

fn chat_router() -> Router {
    Router::new()
        .route(
            "/chat_source/conversation/{one}/{two}",
            post(|| async {
                Json(json!([
                    { "id": "c1", "member_one": "u1", "member_two": "u2" },
                    { "id": "u1", "username": "ann" },
                    { "id": "u2", "username": "bob" }
                ]))
            }),
        )
        .route(
            "/chat_source/last_messages/{id}",
            get(|| async {
                Json(json!([
                    { "id": "m2", "content": "second", "sender_id": "u2", "conversation_id": "c1", "created_at": "2024-05-01T10:01:00" },
                    { "id": "m1", "content": "first", "sender_id": "u1", "conversation_id": "c1", "created_at": "2024-05-01T10:00:00" }
                ]))
            }),
        )
        .merge(echo_chat_router())
}

async fn open_session(app: Router) -> Result<ChatSession, ClientError> {
    let origin = spawn_server(app).await;
    let config = ClientConfig::default().with_base_url(&origin).unwrap().with_token(Some("tok".into()));
    let api = Arc::new(ApiClient::new(&config).unwrap());
    ChatSession::open(api, "u1", "u2", 50).await
}

async fn wait_for_messages(rx: &mut watch::Receiver<ChatState>, count: usize) -> Vec<Message> {
    timeout(Duration::from_secs(2), async {
        loop {
            let messages = rx.borrow_and_update().messages.clone();
            if messages.len() >= count {
                return messages;
            }
            rx.changed().await.expect("chat state sender dropped");
        }
    })
    .await
    .expect("timed out waiting for chat messages")
}

#[tokio::test]
async fn open_loads_history_then_appends_echoes_in_order() {
    let session = open_session(chat_router()).await.unwrap();
    assert_eq!(session.conversation_id(), "c1");
    assert!(session.is_open());

    let snapshot = session.snapshot();
    assert_eq!(contents(&snapshot.messages), ["first", "second"]);
    assert_eq!(snapshot.member("u2").map(|m| m.username.as_str()), Some("bob"));

    let mut rx = session.subscribe();
    session.send("third").unwrap();
    session.send("fourth").unwrap();
    let messages = wait_for_messages(&mut rx, 4).await;
    assert_eq!(contents(&messages), ["first", "second", "third", "fourth"]);
    assert!(matches!(messages[2].created_at, Timestamp::Millis(ms) if ms > 0));
    assert_eq!(messages[3].sender_id, "u1");

    session.close().await;
}

#[tokio::test]
async fn session_search_spans_history_and_live_messages() {
    let session = open_session(chat_router()).await.unwrap();
    let mut rx = session.subscribe();
    session.send("First again").unwrap();
    wait_for_messages(&mut rx, 3).await;

    assert_eq!(session.search("FIRST"), 2);
    assert_eq!(session.next_match(), Some(2));
    assert_eq!(session.prev_match(), Some(0));
    session.clear_search();
    assert!(session.snapshot().search.results.is_empty());
    session.close().await;
}

#[tokio::test]
async fn open_fails_when_conversation_lookup_fails() {
    let app = Router::new().route(
        "/chat_source/conversation/{one}/{two}",
        post(|| async { Json(json!({ "error_type": "NotFound", "error_msg": "User not found" })) }),
    );
    let err = open_session(app).await.err().unwrap();
    assert_eq!(err.to_string(), "User not found");
}
