//! Session store: the signed-in user's record.
//!
//! The record is default (empty id) whenever nobody is signed in. Login,
//! register and profile updates replace it wholesale with the server's copy;
//! logout, failed logins and authorization failures reset it.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ClientError;
use crate::net::api::ApiClient;
use crate::net::types::User;

pub struct SessionStore {
    api: Arc<ApiClient>,
    user: User,
}

impl SessionStore {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api, user: User::default() }
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        !self.user.id.is_empty()
    }

    /// # Errors
    ///
    /// The server's rejection; the record is left default.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User, ClientError> {
        let result = self.api.login(email, password).await;
        self.install(result, "login")
    }

    /// # Errors
    ///
    /// The server's rejection; the record is left default.
    pub async fn register(&mut self, username: &str, email: &str, password: &str) -> Result<&User, ClientError> {
        let result = self.api.register(username, email, password).await;
        self.install(result, "register")
    }

    fn install(&mut self, result: Result<User, ClientError>, action: &str) -> Result<&User, ClientError> {
        match result {
            Ok(user) => {
                info!(user_id = %user.id, username = %user.username, action, "signed in");
                self.user = user;
                Ok(&self.user)
            }
            Err(error) => {
                warn!(%error, action, "sign-in rejected");
                self.user = User::default();
                Err(error)
            }
        }
    }

    /// Log out. The local record and token are dropped even if the server
    /// call fails.
    ///
    /// # Errors
    ///
    /// The logout request's failure.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let result = self.api.logout().await;
        self.user = User::default();
        info!("signed out");
        result
    }

    /// Re-read the record from the server. An authorization failure resets
    /// it; other failures keep the cached record.
    ///
    /// # Errors
    ///
    /// The lookup's failure.
    pub async fn refresh(&mut self) -> Result<&User, ClientError> {
        match self.api.current_user().await {
            Ok(user) => {
                self.user = user;
                Ok(&self.user)
            }
            Err(error) => {
                if error.is_unauthorized() {
                    warn!(%error, "session no longer valid");
                    self.user = User::default();
                }
                Err(error)
            }
        }
    }

    /// Update profile fields, then re-read the record.
    ///
    /// # Errors
    ///
    /// The update's or the refresh's failure.
    pub async fn update_profile(&mut self, username: &str, profile_url: &str, bio: &str) -> Result<&User, ClientError> {
        self.api.update_profile(username, profile_url, bio).await?;
        self.refresh().await
    }
}
