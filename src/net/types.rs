//! Wire DTOs for the REST and chat socket boundary.
//!
//! DESIGN
//! ======
//! These types mirror the external API's JSON payloads. Identifiers stay as
//! strings because the client never interprets them. Nullable server
//! columns (`name`, `description`, `cover_attachment`) are `Option`s.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// BOARDS
// =============================================================================

/// A full board as returned by `GET /boards/{id}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

/// Entry in the owned-board list (`GET /boards`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Rank among the board's columns.
    pub position: i32,
}

/// Card summary as listed on the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub column_id: String,
    /// Dense zero-based rank among cards sharing `column_id`.
    pub position: i32,
    #[serde(default)]
    pub cover_attachment: Option<String>,
}

/// Card detail loaded for the edit modal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetail {
    pub id: String,
    pub name: String,
    pub column_id: String,
    pub position: i32,
    #[serde(default)]
    pub cover_attachment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl CardDetail {
    /// Project the detail record down to its board-list summary.
    #[must_use]
    pub fn summary(&self) -> Card {
        Card {
            id: self.id.clone(),
            name: self.name.clone(),
            column_id: self.column_id.clone(),
            position: self.position,
            cover_attachment: self.cover_attachment.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewBoard<'a> {
    pub name: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ColumnPayload<'a> {
    pub name: &'a str,
    pub position: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewCard<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub column_id: &'a str,
    pub position: i32,
}

#[derive(Clone, Debug, Serialize)]
pub struct CardUpdate<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub cover_attachment: &'a str,
}

// =============================================================================
// USERS
// =============================================================================

/// Public user record; also used for conversation members and friends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub profile_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Conversation participant.
pub type Member = User;

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileUpdate<'a> {
    pub username: &'a str,
    pub profile_url: &'a str,
    pub bio: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendCode {
    pub code: String,
    pub expires_at: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRelationship {
    pub user_id: String,
    pub friend_id: String,
    pub created_at: String,
}

/// Uploaded file row from `GET /api/files`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
    pub private: bool,
    pub user_id: String,
}

// =============================================================================
// CHAT
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub member_one: String,
    pub member_two: String,
}

/// Message timestamp. Socket frames carry epoch milliseconds while stored
/// history rows carry the server's naive datetime string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    Text(String),
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::Millis(0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{ms}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// A chat message. Echoed frames may omit the server-assigned `id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub content: String,
    pub sender_id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub created_at: Timestamp,
}

/// Outbound message frame with a client-generated timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    pub sender_id: String,
    pub conversation_id: String,
    pub created_at: i64,
}

/// First frame sent on every chat socket; the socket's only authentication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub token: String,
    pub conversation_id: String,
}

/// Decoded inbound socket frame.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatFrame {
    /// Control envelope carrying a `message` field; logged, never displayed.
    Envelope(Value),
    Message(Message),
}

impl ChatFrame {
    /// Decode a text frame. An object whose `message` field is set (not null,
    /// empty, `false` or zero) is an envelope.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when the frame is not JSON or not a message shape.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        if let Some(envelope) = value.get("message").filter(|field| is_set(field)) {
            return Ok(Self::Envelope(envelope.clone()));
        }
        serde_json::from_value(value).map(Self::Message)
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
