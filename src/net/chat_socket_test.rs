use super::*;
use crate::net::api::{CHAT_EVENTS_PATH, ws_url};
use crate::net::test_helpers::{closing_chat_router, echo_chat_router, spawn_server};
use crate::net::types::Message;
use serde_json::json;
use tokio::time::{sleep, timeout};

fn handshake() -> Handshake {
    Handshake { token: "tok".into(), conversation_id: "conv-1".into() }
}

fn outgoing(content: &str, created_at: i64) -> OutgoingMessage {
    OutgoingMessage {
        content: content.into(),
        sender_id: "u1".into(),
        conversation_id: "conv-1".into(),
        created_at,
    }
}

async fn next_frame(rx: &mut mpsc::UnboundedReceiver<ChatFrame>) -> ChatFrame {
    timeout(Duration::from_millis(1000), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("handler channel closed")
}

async fn connect_echo() -> (ChatSocket, mpsc::UnboundedReceiver<ChatFrame>) {
    let origin = spawn_server(echo_chat_router()).await;
    let url = ws_url(&origin, CHAT_EVENTS_PATH).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let socket = ChatSocket::connect(&url, &handshake(), move |frame| {
        let _ = tx.send(frame);
    })
    .await
    .expect("connect to echo server");
    (socket, rx)
}

#[tokio::test]
async fn handshake_is_first_frame_server_sees() {
    let (socket, mut rx) = connect_echo().await;

    let greeting = next_frame(&mut rx).await;
    assert_eq!(greeting, ChatFrame::Envelope(json!("joined conv-1")));
    assert!(socket.is_open());
    socket.close().await;
}

#[tokio::test]
async fn frames_dispatch_in_delivery_order() {
    let (socket, mut rx) = connect_echo().await;
    let _ = next_frame(&mut rx).await;

    // Timestamps deliberately out of order: delivery order must win.
    socket.send(&outgoing("first", 300)).unwrap();
    socket.send(&outgoing("second", 100)).unwrap();
    socket.send(&outgoing("third", 200)).unwrap();

    let mut contents = Vec::new();
    for _ in 0..3 {
        match next_frame(&mut rx).await {
            ChatFrame::Message(Message { content, .. }) => contents.push(content),
            ChatFrame::Envelope(other) => panic!("unexpected envelope {other}"),
        }
    }
    assert_eq!(contents, ["first", "second", "third"]);
    socket.close().await;
}

#[tokio::test]
async fn server_close_marks_socket_closed_and_rejects_sends() {
    let origin = spawn_server(closing_chat_router()).await;
    let url = ws_url(&origin, CHAT_EVENTS_PATH).unwrap();
    let socket = ChatSocket::connect(&url, &handshake(), |_| {}).await.unwrap();

    for _ in 0..50 {
        if !socket.is_open() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert!(!socket.is_open());
    assert!(matches!(socket.send(&outgoing("late", 1)), Err(ClientError::WsClosed)));
}

#[tokio::test]
async fn connect_to_missing_server_fails() {
    let result = ChatSocket::connect("ws://127.0.0.1:9/chat_source/events", &handshake(), |_| {}).await;
    assert!(matches!(result, Err(ClientError::WsConnect(_))));
}
