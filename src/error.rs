//! Client error taxonomy.
//!
//! DESIGN
//! ======
//! Three failure families reach callers: transport failures (socket or
//! HTTP layer), application errors reported through the server's
//! `error_msg` envelope, and authorization failures that should reset the
//! session. Local precondition failures (no board loaded, cross-column swap)
//! are reported before any request is sent.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Error types the server reports for a missing or rejected session.
const AUTH_ERROR_TYPES: &[&str] = &["Unauthorized", "InvalidToken"];

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an `error_msg` envelope.
    #[error("{message}")]
    Api { message: String },

    /// The server rejected the session.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// Non-success status without a usable body.
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("websocket closed")]
    WsClosed,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A board mutation was requested before any board was loaded.
    #[error("no board is loaded")]
    NoBoard,

    #[error("card not found: {0}")]
    CardNotFound(String),

    /// `swap_cards` requires both cards to live in the named column.
    #[error("cards {first} and {second} are not both in column {column_id}")]
    CrossColumnSwap { first: String, second: String, column_id: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Build the error for an `error_msg` envelope, classifying auth failures.
    #[must_use]
    pub fn from_envelope(status: u16, error_type: Option<&str>, message: String) -> Self {
        let auth_type = error_type.is_some_and(|kind| AUTH_ERROR_TYPES.contains(&kind));
        if status == 401 || auth_type {
            Self::Unauthorized { message }
        } else {
            Self::Api { message }
        }
    }

    /// True when the session store should drop its user record.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Status { status: 401, .. })
    }

    /// Whether repeating the same call could plausibly succeed.
    ///
    /// Informational only; the client never retries on its own.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => matches!(status, 429 | 500..=599),
            Self::WsConnect(_) | Self::WsClosed => true,
            _ => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WsConnect(Box::new(error))
    }
}
