//! Client-side stores.
//!
//! DESIGN
//! ======
//! Each store owns one slice of client state and is the only code allowed to
//! mutate it. `AppState` bundles the stores the CLI needs around a single
//! shared [`ApiClient`], so the session token installed by login is the one
//! every later request carries.


pub mod boards;
pub mod chat;
pub mod drag;
pub mod kanban;
pub mod session;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::types::User;
use boards::BoardListStore;
use chat::ChatSession;
use kanban::{KanbanHandle, KanbanStore};
use session::SessionStore;

// =============================================================================
// APP STATE
// =============================================================================

/// Root-owned store bundle. Clone is cheap: every field is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ClientConfig>,
    pub api: Arc<ApiClient>,
    pub session: Arc<Mutex<SessionStore>>,
    pub boards: Arc<Mutex<BoardListStore>>,
    pub kanban: KanbanHandle<ApiClient>,
}

impl AppState {
    /// Build every store around one API client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let api = Arc::new(ApiClient::new(&config)?);
        Ok(Self {
            session: Arc::new(Mutex::new(SessionStore::new(Arc::clone(&api)))),
            boards: Arc::new(Mutex::new(BoardListStore::new(Arc::clone(&api)))),
            kanban: KanbanHandle::new(KanbanStore::new(Arc::clone(&api))),
            config: Arc::new(config),
            api,
        })
    }

    /// Log in and, only on success, load the user's board list.
    ///
    /// # Errors
    ///
    /// The login rejection or the board list failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let user = self.session.lock().await.login(email, password).await?.clone();
        self.boards.lock().await.request_user_boards().await?;
        Ok(user)
    }

    /// Open a chat with `receiver_id` as the signed-in user.
    ///
    /// # Errors
    ///
    /// [`ClientError::Unauthorized`] when nobody is signed in, otherwise
    /// whatever opening the session fails with.
    pub async fn open_chat(&self, receiver_id: &str) -> Result<ChatSession, ClientError> {
        let me = self.session.lock().await.user().id.clone();
        if me.is_empty() {
            return Err(ClientError::Unauthorized { message: "sign in before chatting".into() });
        }
        ChatSession::open(Arc::clone(&self.api), &me, receiver_id, self.config.history_limit).await
    }

    /// Log out and clear every store.
    ///
    /// # Errors
    ///
    /// Propagates the logout request error; stores are cleared regardless.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let result = self.session.lock().await.logout().await;
        self.boards.lock().await.reset();
        self.kanban.lock().await.reset();
        info!("signed out; stores cleared");
        result
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
