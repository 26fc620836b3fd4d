//! WebSocket session for one chat conversation.
//!
//! The `ChatSocket` opens the event socket, sends the `{ token,
//! conversation_id }` handshake as the very first frame, decodes every inbound
//! text frame and hands it to the caller's handler in arrival order. Outbound
//! frames go through an unbounded channel drained by a writer task so `send`
//! never blocks the caller.
//!
//! ERROR HANDLING
//! ==============
//! Undecodable frames are logged and skipped. A transport error or a server
//! close ends the reader; the socket is then permanently closed. There is no
//! reconnect: a new session must be opened.

#[cfg(test)]
#[path = "chat_socket_test.rs"]
mod chat_socket_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{ChatFrame, Handshake, OutgoingMessage};
use crate::error::ClientError;

/// How long `close` waits for the writer to flush the close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

pub struct ChatSocket {
    session_id: Uuid,
    outbound: mpsc::UnboundedSender<WsMessage>,
    open: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl ChatSocket {
    /// Connect, send the handshake, and start dispatching frames to `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::WsConnect`] if the upgrade or the handshake send
    /// fails.
    pub async fn connect<F>(url: &str, handshake: &Handshake, mut handler: F) -> Result<Self, ClientError>
    where
        F: FnMut(ChatFrame) + Send + 'static,
    {
        let session_id = Uuid::new_v4();
        let (stream, _) = connect_async(url).await?;
        let (mut sink, mut source) = stream.split();

        let hello = serde_json::to_string(handshake)?;
        sink.send(WsMessage::text(hello)).await?;
        info!(%session_id, conversation_id = %handshake.conversation_id, "chat socket connected");

        let open = Arc::new(AtomicBool::new(true));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

        let writer_open = Arc::clone(&open);
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, WsMessage::Close(_));
                if let Err(error) = sink.send(message).await {
                    warn!(%session_id, %error, "chat socket send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_open.store(false, Ordering::Release);
            let _ = sink.close().await;
        });

        let reader_open = Arc::clone(&open);
        let reader = tokio::spawn(async move {
            while let Some(next) = source.next().await {
                match next {
                    Ok(WsMessage::Text(text)) => match ChatFrame::parse(text.as_str()) {
                        Ok(frame) => handler(frame),
                        Err(error) => warn!(%session_id, %error, "undecodable chat frame skipped"),
                    },
                    Ok(WsMessage::Close(frame)) => {
                        info!(%session_id, ?frame, "chat socket closed by server");
                        break;
                    }
                    Ok(other) => debug!(%session_id, kind = ?other, "non-text chat frame ignored"),
                    Err(error) => {
                        warn!(%session_id, %error, "chat socket error");
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::Release);
        });

        Ok(Self { session_id, outbound, open, reader: Some(reader), writer: Some(writer) })
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// False once the server closed the socket, the transport failed, or
    /// `close` was called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Queue an outbound message frame.
    ///
    /// # Errors
    ///
    /// [`ClientError::WsClosed`] when the socket is no longer open.
    pub fn send(&self, message: &OutgoingMessage) -> Result<(), ClientError> {
        if !self.is_open() {
            return Err(ClientError::WsClosed);
        }
        let text = serde_json::to_string(message)?;
        self.outbound
            .send(WsMessage::text(text))
            .map_err(|_| ClientError::WsClosed)
    }

    /// Send a close frame and stop both tasks.
    pub async fn close(mut self) {
        self.open.store(false, Ordering::Release);
        let _ = self.outbound.send(WsMessage::Close(None));
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(CLOSE_GRACE, writer).await.is_err() {
                warn!(session_id = %self.session_id, "chat socket close timed out");
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        info!(session_id = %self.session_id, "chat socket closed");
    }
}

impl Drop for ChatSocket {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
