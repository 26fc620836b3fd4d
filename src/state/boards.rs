//! Board list store: the boards the signed-in user owns.

#[cfg(test)]
#[path = "boards_test.rs"]
mod boards_test;

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ClientError;
use crate::net::api::{ApiClient, KanbanApi};
use crate::net::types::BoardSummary;

pub struct BoardListStore {
    api: Arc<ApiClient>,
    items: Vec<BoardSummary>,
}

impl BoardListStore {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api, items: Vec::new() }
    }

    #[must_use]
    pub fn items(&self) -> &[BoardSummary] {
        &self.items
    }

    /// Replace the list with the server's.
    ///
    /// # Errors
    ///
    /// The list request's failure; the list is kept.
    pub async fn request_user_boards(&mut self) -> Result<&[BoardSummary], ClientError> {
        self.items = self.api.list_boards().await?;
        debug!(count = self.items.len(), "board list loaded");
        Ok(&self.items)
    }

    /// Create a board and append the server's `{id, name}` for it.
    ///
    /// # Errors
    ///
    /// The create or the follow-up fetch failure; nothing is appended.
    pub async fn add_user_board(&mut self, name: &str) -> Result<BoardSummary, ClientError> {
        let board_id = self.api.create_board(name).await?;
        let board = self.api.fetch_board(&board_id).await?;
        let summary = BoardSummary { id: board.id, name: board.name };
        info!(board_id = %summary.id, name = %summary.name, "board created");
        self.items.push(summary.clone());
        Ok(summary)
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }
}
