//! REST API helpers for communicating with the board/chat server.
//!
//! DESIGN
//! ======
//! `ApiClient` wraps one `reqwest::Client` and attaches the session token to
//! every request, both as `Authorization: Bearer` and as the `token` cookie
//! the server actually reads. Endpoint helpers are thin: one request, one
//! decode. The board endpoints the Kanban store needs sit behind the
//! [`KanbanApi`] trait so the store can be driven without a network.
//!
//! ERROR HANDLING
//! ==============
//! Any JSON body carrying `error_msg` is a failure regardless of HTTP status.
//! A body without it is decoded as the expected type; only when that decode
//! fails does a non-success status surface as [`ClientError::Status`].

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::types::{
    Attachment, Board, BoardSummary, Card, CardDetail, CardUpdate, Column, ColumnPayload, Conversation, FileEntry,
    FriendCode, FriendRelationship, LoginRequest, Member, Message, NewBoard, NewCard, ProfileUpdate, RegisterRequest,
    User,
};
use crate::config::ClientConfig;
use crate::error::ClientError;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Path of the chat event socket, relative to the API origin.
pub const CHAT_EVENTS_PATH: &str = "/chat_source/events";

// =============================================================================
// KANBAN API SEAM
// =============================================================================

/// Board, column, and card endpoints used by the Kanban store.
#[async_trait::async_trait]
pub trait KanbanApi: Send + Sync {
    async fn fetch_board(&self, board_id: &str) -> Result<Board, ClientError>;

    /// Create a column and return its server-assigned id.
    async fn create_column(&self, board_id: &str, name: &str, position: i32) -> Result<String, ClientError>;

    async fn fetch_column(&self, board_id: &str, column_id: &str) -> Result<Column, ClientError>;

    async fn update_column(&self, board_id: &str, column_id: &str, name: &str, position: i32)
    -> Result<(), ClientError>;

    async fn delete_column(&self, board_id: &str, column_id: &str) -> Result<(), ClientError>;

    async fn create_card(&self, board_id: &str, column_id: &str, name: &str, position: i32)
    -> Result<Card, ClientError>;

    async fn fetch_card(&self, board_id: &str, column_id: &str, card_id: &str) -> Result<Card, ClientError>;

    async fn fetch_column_cards(&self, board_id: &str, column_id: &str) -> Result<Vec<Card>, ClientError>;

    async fn update_card(
        &self,
        board_id: &str,
        column_id: &str,
        card_id: &str,
        update: &CardUpdate<'_>,
    ) -> Result<(), ClientError>;

    async fn delete_card(&self, board_id: &str, column_id: &str, card_id: &str) -> Result<(), ClientError>;

    /// Exchange the positions of two cards in one column.
    async fn swap_cards(&self, board_id: &str, column_id: &str, first: &str, second: &str)
    -> Result<(), ClientError>;

    /// Move a card to `to_position` in `to_column`; the server shifts siblings.
    async fn reorder_card(
        &self,
        board_id: &str,
        from_column: &str,
        card_id: &str,
        to_column: &str,
        to_position: i32,
    ) -> Result<(), ClientError>;

    async fn fetch_card_detail(&self, board_id: &str, card_id: &str) -> Result<CardDetail, ClientError>;

    async fn upload_attachment(
        &self,
        board_id: &str,
        card_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError>;

    async fn delete_attachment(&self, board_id: &str, card_id: &str, attachment_id: &str) -> Result<(), ClientError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Build a client from typed config.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;
        Ok(Self { http, base_url: config.base_url.clone(), token: RwLock::new(config.token.clone()) })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current session token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// WebSocket URL for the chat event stream on this API origin.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if the origin is not http(s).
    pub fn chat_events_url(&self) -> Result<String, ClientError> {
        ws_url(&self.base_url, CHAT_EVENTS_PATH)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        match self.token() {
            Some(token) => request
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(COOKIE, format!("{TOKEN_COOKIE}={token}")),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let (_, value) = self.send_with_headers(request).await?;
        Ok(value)
    }

    async fn send_with_headers<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(HeaderMap, T), ClientError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "api response");
        let value = decode_body(status, &body)?;
        Ok((headers, value))
    }

    /// `GET path`, decoded as `T`.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::GET, path)).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::DELETE, path)).await
    }

    /// `POST path` with a multipart form body.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, path).multipart(form)).await
    }

    // =========================================================================
    // BOARDS
    // =========================================================================

    /// List the boards the current user can open.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn list_boards(&self) -> Result<Vec<BoardSummary>, ClientError> {
        self.get("/boards").await
    }

    /// Create a board and return its id.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn create_board(&self, name: &str) -> Result<String, ClientError> {
        self.post("/boards", &NewBoard { name }).await
    }

    /// List a card's attachments.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn list_attachments(&self, board_id: &str, card_id: &str) -> Result<Vec<Attachment>, ClientError> {
        self.get(&format!("/boards/{board_id}/cards/{card_id}/attachments")).await
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// Register and install the session token from the `token` cookie.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User, ClientError> {
        let body = RegisterRequest { username, email, password };
        self.authenticate("/api/register", &body).await
    }

    /// Log in and install the session token from the `token` cookie.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        self.authenticate("/api/login", &LoginRequest { email, password }).await
    }

    async fn authenticate<B: Serialize>(&self, path: &str, body: &B) -> Result<User, ClientError> {
        let (headers, user) = self
            .send_with_headers::<User>(self.request(Method::POST, path).json(body))
            .await?;
        if let Some(token) = token_from_headers(&headers) {
            self.set_token(Some(token));
        }
        Ok(user)
    }

    /// Log out and forget the local token even if the server call fails.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let result = self.post::<_, Value>("/api/logout", &Value::Null).await;
        self.set_token(None);
        result.map(|_| ())
    }

    /// The "who am I" check.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unauthorized`] without a valid session.
    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.get("/api/user").await
    }

    /// Update the profile fields; the server answers with the user id.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn update_profile(&self, username: &str, profile_url: &str, bio: &str) -> Result<String, ClientError> {
        self.put("/api/user", &ProfileUpdate { username, profile_url, bio }).await
    }

    // =========================================================================
    // FRIENDS
    // =========================================================================

    /// Generate a fresh friend code for the current user.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn create_friend_code(&self) -> Result<FriendCode, ClientError> {
        self.post("/friends/code", &Value::Null).await
    }

    /// Redeem another user's friend code.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn redeem_friend_code(&self, code: &str) -> Result<FriendRelationship, ClientError> {
        self.post("/friends/redeem", code.trim()).await
    }

    /// List the current user's friends.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn list_friends(&self) -> Result<Vec<Member>, ClientError> {
        self.get("/friends/list").await
    }

    // =========================================================================
    // FILES
    // =========================================================================

    /// List public files plus the current user's private ones.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn list_files(&self) -> Result<Vec<FileEntry>, ClientError> {
        self.get("/api/files").await
    }

    /// Upload a file and return the stored file name.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn upload_file(&self, filename: &str, bytes: Vec<u8>, is_private: bool) -> Result<String, ClientError> {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_owned()))
            .text("filename", filename.to_owned())
            .text("is_private", is_private.to_string());
        self.post_multipart("/api/file/create", form).await
    }

    /// Delete one of the current user's files.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn delete_file(&self, name: &str) -> Result<(), ClientError> {
        self.delete::<Value>(&format!("/api/file/{name}")).await.map(|_| ())
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Resolve (or create) the conversation between two users.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn find_conversation(
        &self,
        member_one: &str,
        member_two: &str,
    ) -> Result<(Conversation, Vec<Member>), ClientError> {
        let (conversation, one, two): (Conversation, Member, Member) = self
            .post(&format!("/chat_source/conversation/{member_one}/{member_two}"), &Value::Null)
            .await?;
        Ok((conversation, vec![one, two]))
    }

    /// Latest messages of a conversation, newest first as the server sends them.
    ///
    /// # Errors
    ///
    /// Transport, envelope, or decode failures.
    pub async fn last_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ClientError> {
        self.get(&format!("/chat_source/last_messages/{conversation_id}")).await
    }
}

#[async_trait::async_trait]
impl KanbanApi for ApiClient {
    async fn fetch_board(&self, board_id: &str) -> Result<Board, ClientError> {
        self.get(&format!("/boards/{board_id}")).await
    }

    async fn create_column(&self, board_id: &str, name: &str, position: i32) -> Result<String, ClientError> {
        self.post(&format!("/boards/{board_id}/columns"), &ColumnPayload { name, position })
            .await
    }

    async fn fetch_column(&self, board_id: &str, column_id: &str) -> Result<Column, ClientError> {
        self.get(&format!("/boards/{board_id}/columns/{column_id}")).await
    }

    async fn update_column(
        &self,
        board_id: &str,
        column_id: &str,
        name: &str,
        position: i32,
    ) -> Result<(), ClientError> {
        self.put::<_, Value>(&format!("/boards/{board_id}/columns/{column_id}"), &ColumnPayload { name, position })
            .await
            .map(|_| ())
    }

    async fn delete_column(&self, board_id: &str, column_id: &str) -> Result<(), ClientError> {
        self.delete::<Value>(&format!("/boards/{board_id}/columns/{column_id}"))
            .await
            .map(|_| ())
    }

    async fn create_card(
        &self,
        board_id: &str,
        column_id: &str,
        name: &str,
        position: i32,
    ) -> Result<Card, ClientError> {
        let body = NewCard { name, description: "", column_id, position };
        self.post(&format!("/boards/{board_id}/columns/{column_id}/cards"), &body)
            .await
    }

    async fn fetch_card(&self, board_id: &str, column_id: &str, card_id: &str) -> Result<Card, ClientError> {
        self.get(&format!("/boards/{board_id}/columns/{column_id}/cards/{card_id}"))
            .await
    }

    async fn fetch_column_cards(&self, board_id: &str, column_id: &str) -> Result<Vec<Card>, ClientError> {
        self.get(&format!("/boards/{board_id}/columns/{column_id}/cards")).await
    }

    async fn update_card(
        &self,
        board_id: &str,
        column_id: &str,
        card_id: &str,
        update: &CardUpdate<'_>,
    ) -> Result<(), ClientError> {
        self.put::<_, Value>(&format!("/boards/{board_id}/columns/{column_id}/cards/{card_id}"), update)
            .await
            .map(|_| ())
    }

    async fn delete_card(&self, board_id: &str, column_id: &str, card_id: &str) -> Result<(), ClientError> {
        self.delete::<Value>(&format!("/boards/{board_id}/columns/{column_id}/cards/{card_id}"))
            .await
            .map(|_| ())
    }

    async fn swap_cards(
        &self,
        board_id: &str,
        column_id: &str,
        first: &str,
        second: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/boards/{board_id}/columns/{column_id}/cards/{first}/{second}");
        self.put::<_, Value>(&path, &serde_json::json!({})).await.map(|_| ())
    }

    async fn reorder_card(
        &self,
        board_id: &str,
        from_column: &str,
        card_id: &str,
        to_column: &str,
        to_position: i32,
    ) -> Result<(), ClientError> {
        let path = format!("/boards/{board_id}/columns/{from_column}/cards/{card_id}/reorder/{to_column}/{to_position}");
        self.put::<_, Value>(&path, &serde_json::json!({})).await.map(|_| ())
    }

    async fn fetch_card_detail(&self, board_id: &str, card_id: &str) -> Result<CardDetail, ClientError> {
        self.get(&format!("/boards/{board_id}/cards/{card_id}")).await
    }

    async fn upload_attachment(
        &self,
        board_id: &str,
        card_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ClientError> {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename.to_owned()))
            .text("filename", filename.to_owned());
        self.post_multipart::<Value>(&format!("/boards/{board_id}/cards/{card_id}/attachments"), form)
            .await
            .map(|_| ())
    }

    async fn delete_attachment(&self, board_id: &str, card_id: &str, attachment_id: &str) -> Result<(), ClientError> {
        self.delete::<Value>(&format!("/boards/{board_id}/cards/{card_id}/attachments/{attachment_id}"))
            .await
            .map(|_| ())
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Normalize a response body: `error_msg` envelopes become errors, anything
/// else decodes as `T`.
///
/// # Errors
///
/// [`ClientError::Api`]/[`ClientError::Unauthorized`] for envelopes,
/// [`ClientError::Status`] for undecodable non-success bodies,
/// [`ClientError::Decode`] for undecodable success bodies.
pub fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ClientError> {
    let success = (200..300).contains(&status);
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) if !success => return Err(ClientError::Status { status, body: body.to_owned() }),
        Err(e) => return Err(ClientError::Decode(e)),
    };

    if let Some(message) = value.get("error_msg").filter(|m| !m.is_null()) {
        let message = message
            .as_str()
            .map_or_else(|| message.to_string(), ToOwned::to_owned);
        let error_type = value.get("error_type").and_then(Value::as_str);
        return Err(ClientError::from_envelope(status, error_type, message));
    }

    match serde_json::from_value::<T>(value) {
        Ok(decoded) => Ok(decoded),
        Err(_) if !success => Err(ClientError::Status { status, body: body.to_owned() }),
        Err(e) => Err(ClientError::Decode(e)),
    }
}

/// Extract the session token from `Set-Cookie: token=...` headers.
#[must_use]
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_set_cookie)
}

fn token_from_set_cookie(raw: &str) -> Option<String> {
    let pair = raw.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    (name.trim() == TOKEN_COOKIE && !value.is_empty()).then(|| value.trim().to_owned())
}

/// Map an http(s) origin to the matching ws(s) URL for `path`.
///
/// # Errors
///
/// Returns [`ClientError::InvalidBaseUrl`] for other schemes.
pub fn ws_url(base_url: &str, path: &str) -> Result<String, ClientError> {
    let base = base_url.trim_end_matches('/');
    if let Some(rest) = base.strip_prefix("http://") {
        return Ok(format!("ws://{rest}{path}"));
    }
    if let Some(rest) = base.strip_prefix("https://") {
        return Ok(format!("wss://{rest}{path}"));
    }
    Err(ClientError::InvalidBaseUrl(base_url.to_owned()))
}
