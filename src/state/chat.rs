//! Chat conversation state and its live session.
//!
//! DESIGN
//! ======
//! `ChatState` is a plain value: history, live frames, and the search cursor.
//! `ChatSession` owns the socket for one conversation and funnels every
//! inbound frame into a `watch` channel holding that state, so readers see
//! messages in delivery order and never the timestamp order.
//!
//! Opening a session resolves the conversation, loads history, and only then
//! connects. Frames arriving after the connect are appended after history, so
//! none are lost to a late history response.
//!
//! Sent messages are not appended locally. The server echoes them back on the
//! socket and they land in delivery order like any other frame.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::chat_socket::ChatSocket;
use crate::net::types::{ChatFrame, Conversation, Handshake, Member, Message, OutgoingMessage};

// =============================================================================
// STATE
// =============================================================================

/// Case-insensitive content search over the loaded messages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    /// Indices into `ChatState::messages`, ascending.
    pub results: Vec<usize>,
    /// Position within `results`; `None` when there are no results.
    pub current: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatState {
    pub conversation: Option<Conversation>,
    pub members: Vec<Member>,
    /// Oldest first, then live frames in delivery order.
    pub messages: Vec<Message>,
    pub search: SearchState,
}

impl ChatState {
    /// Install history received newest-first, keeping at most `limit` of the
    /// newest messages.
    pub fn apply_history(&mut self, newest_first: Vec<Message>, limit: usize) {
        let mut history: Vec<Message> = newest_first.into_iter().take(limit).collect();
        history.reverse();
        self.messages = history;
    }

    /// Append a live message; control envelopes are only logged.
    pub fn apply_frame(&mut self, frame: ChatFrame) {
        match frame {
            ChatFrame::Envelope(envelope) => info!(%envelope, "chat control frame"),
            ChatFrame::Message(message) => {
                debug!(sender_id = %message.sender_id, created_at = %message.created_at, "chat message received");
                self.messages.push(message);
            }
        }
    }

    /// Member record for `user_id`, if they belong to the conversation.
    #[must_use]
    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.id == user_id)
    }

    /// Run a search and point at the first hit. A blank query clears the
    /// results. Returns the number of hits.
    pub fn search(&mut self, query: &str) -> usize {
        self.search.query = query.to_owned();
        if query.trim().is_empty() {
            self.search.results.clear();
            self.search.current = None;
            return 0;
        }

        let needle = query.to_lowercase();
        self.search.results = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.content.to_lowercase().contains(&needle))
            .map(|(index, _)| index)
            .collect();
        self.search.current = if self.search.results.is_empty() { None } else { Some(0) };
        self.search.results.len()
    }

    /// Advance to the next hit, wrapping. Returns the message index.
    pub fn next_match(&mut self) -> Option<usize> {
        self.step(1)
    }

    /// Go back to the previous hit, wrapping. Returns the message index.
    pub fn prev_match(&mut self) -> Option<usize> {
        let len = self.search.results.len();
        self.step(len.saturating_sub(1))
    }

    fn step(&mut self, forward: usize) -> Option<usize> {
        let len = self.search.results.len();
        if len == 0 {
            return None;
        }
        let current = self.search.current.map_or(0, |current| (current + forward) % len);
        self.search.current = Some(current);
        self.current_match()
    }

    /// Message index of the highlighted hit.
    #[must_use]
    pub fn current_match(&self) -> Option<usize> {
        self.search.current.and_then(|current| self.search.results.get(current).copied())
    }

    pub fn clear_search(&mut self) {
        self.search = SearchState::default();
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One open conversation with its live socket.
pub struct ChatSession {
    me: String,
    conversation_id: String,
    socket: ChatSocket,
    state: Arc<watch::Sender<ChatState>>,
}

impl ChatSession {
    /// Resolve the conversation between `me` and `receiver_id`, load its
    /// history, and connect the event socket.
    ///
    /// # Errors
    ///
    /// Any REST failure from the lookup or history load, or
    /// [`ClientError::WsConnect`] if the socket cannot be opened.
    pub async fn open(
        api: Arc<ApiClient>,
        me: &str,
        receiver_id: &str,
        history_limit: usize,
    ) -> Result<Self, ClientError> {
        let (conversation, members) = api.find_conversation(me, receiver_id).await?;
        let history = api.last_messages(&conversation.id).await?;

        let mut initial = ChatState { members, ..ChatState::default() };
        initial.apply_history(history, history_limit);
        let conversation_id = conversation.id.clone();
        initial.conversation = Some(conversation);
        let (state, _) = watch::channel(initial);
        let state = Arc::new(state);

        let handshake = Handshake { token: api.token().unwrap_or_default(), conversation_id: conversation_id.clone() };
        let url = api.chat_events_url()?;
        let sink = Arc::clone(&state);
        let socket = ChatSocket::connect(&url, &handshake, move |frame| {
            sink.send_modify(|state| state.apply_frame(frame));
        })
        .await?;
        info!(%conversation_id, session_id = %socket.session_id(), "chat session opened");

        Ok(Self { me: me.to_owned(), conversation_id, socket, state })
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.socket.is_open()
    }

    /// Send a message stamped with the current client time. It shows up in
    /// the message list once the server echoes it.
    ///
    /// # Errors
    ///
    /// [`ClientError::WsClosed`] once the socket has closed.
    pub fn send(&self, content: &str) -> Result<(), ClientError> {
        let message = OutgoingMessage {
            content: content.to_owned(),
            sender_id: self.me.clone(),
            conversation_id: self.conversation_id.clone(),
            created_at: now_millis(),
        };
        self.socket.send(&message)
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn search(&self, query: &str) -> usize {
        let mut hits = 0;
        self.state.send_modify(|state| hits = state.search(query));
        hits
    }

    pub fn next_match(&self) -> Option<usize> {
        let mut found = None;
        self.state.send_modify(|state| found = state.next_match());
        found
    }

    pub fn prev_match(&self) -> Option<usize> {
        let mut found = None;
        self.state.send_modify(|state| found = state.prev_match());
        found
    }

    pub fn clear_search(&self) {
        self.state.send_modify(ChatState::clear_search);
    }

    /// Close the socket. Messages already received stay readable through
    /// earlier subscriptions.
    pub async fn close(self) {
        info!(conversation_id = %self.conversation_id, "chat session closing");
        self.socket.close().await;
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
