//! Kanban store: the board currently open and every mutation on it.
//!
//! SYSTEM CONTEXT
//! ==============
//! This is the only component that talks to the board, column and card
//! endpoints. Every action calls the server first and then re-syncs a narrow
//! slice of local state from the server's answer. Positions are never
//! computed here: after a swap the column is refetched, after a reorder the
//! whole board is, because one move shifts many siblings.
//!
//! DESIGN
//! ======
//! Action methods take `&mut self`, so one owner can only run one action at a
//! time. [`KanbanHandle`] shares a store behind a FIFO-fair async mutex held
//! for a whole request-then-refetch action, which serializes concurrent
//! callers in arrival order. Readers watch [`KanbanState`] snapshots
//! published after each successful mutation and never wait on that queue.
//!
//! ERROR HANDLING
//! ==============
//! Failed actions return the server's error and leave local state untouched.
//! Deletes mutate local state only after the server confirmed them.

#[cfg(test)]
#[path = "kanban_test.rs"]
mod kanban_test;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info};

use crate::error::ClientError;
use crate::net::api::KanbanApi;
use crate::net::types::{Board, Card, CardDetail, CardUpdate, Column};

// =============================================================================
// STATE
// =============================================================================

/// Local cache of the open board plus the optional card-modal overlay.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KanbanState {
    /// `None` until a board load succeeds, and again after `reset`.
    pub board: Option<Board>,
    /// Detail record of the card open for editing, always server-fetched.
    pub card_modal: Option<CardDetail>,
}

impl KanbanState {
    #[must_use]
    pub fn board_id(&self) -> Option<&str> {
        self.board.as_ref().map(|board| board.id.as_str())
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.board.as_ref().map_or(&[], |board| board.columns.as_slice())
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        self.board.as_ref().map_or(&[], |board| board.cards.as_slice())
    }

    #[must_use]
    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns().iter().find(|column| column.id == column_id)
    }

    #[must_use]
    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards().iter().find(|card| card.id == card_id)
    }

    /// Cards of one column in display order (ascending position).
    #[must_use]
    pub fn column_cards(&self, column_id: &str) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self
            .cards()
            .iter()
            .filter(|card| card.column_id == column_id)
            .collect();
        cards.sort_by_key(|card| card.position);
        cards
    }

    /// Append position for a new column.
    #[must_use]
    pub fn next_column_position(&self) -> i32 {
        i32::try_from(self.columns().len()).unwrap_or(i32::MAX)
    }

    /// Append position for a new card: one past the column's highest position.
    #[must_use]
    pub fn next_card_position(&self, column_id: &str) -> i32 {
        self.cards()
            .iter()
            .filter(|card| card.column_id == column_id)
            .map(|card| card.position.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct KanbanStore<A: ?Sized> {
    api: Arc<A>,
    state: KanbanState,
    updates: watch::Sender<KanbanState>,
}

impl<A: KanbanApi + ?Sized> KanbanStore<A> {
    #[must_use]
    pub fn new(api: Arc<A>) -> Self {
        let (updates, _) = watch::channel(KanbanState::default());
        Self { api, state: KanbanState::default(), updates }
    }

    #[must_use]
    pub fn state(&self) -> &KanbanState {
        &self.state
    }

    /// Receive a snapshot after every successful mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<KanbanState> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.state.clone());
    }

    fn board_id(&self) -> Result<String, ClientError> {
        self.state.board_id().map(ToOwned::to_owned).ok_or(ClientError::NoBoard)
    }

    fn board_mut(&mut self) -> Result<&mut Board, ClientError> {
        self.state.board.as_mut().ok_or(ClientError::NoBoard)
    }

    /// Fetch a board and replace the entire local board.
    ///
    /// # Errors
    ///
    /// Propagates the fetch error; local state is left as it was.
    pub async fn request_board(&mut self, board_id: &str) -> Result<(), ClientError> {
        let board = self.api.fetch_board(board_id).await?;
        info!(board_id, columns = board.columns.len(), cards = board.cards.len(), "board loaded");
        self.state.board = Some(board);
        self.publish();
        Ok(())
    }

    /// Forget the open board and card modal.
    pub fn reset(&mut self) {
        self.state = KanbanState::default();
        self.publish();
    }

    /// Create a column at `position`, then append the server's copy.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn add_column(&mut self, name: &str, position: i32) -> Result<Column, ClientError> {
        let board_id = self.board_id()?;
        let column_id = self.api.create_column(&board_id, name, position).await?;
        let column = self.api.fetch_column(&board_id, &column_id).await?;
        info!(%board_id, column_id = %column.id, position, "column added");
        self.board_mut()?.columns.push(column.clone());
        self.publish();
        Ok(column)
    }

    /// Delete a column and drop it plus all of its cards locally.
    ///
    /// The local cascade mirrors the server's own cascade.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn delete_column(&mut self, column_id: &str) -> Result<(), ClientError> {
        let board_id = self.board_id()?;
        self.api.delete_column(&board_id, column_id).await?;
        let board = self.board_mut()?;
        board.columns.retain(|column| column.id != column_id);
        board.cards.retain(|card| card.column_id != column_id);
        info!(%board_id, column_id, "column deleted");
        self.publish();
        Ok(())
    }

    /// Update a column, then replace it with the server's copy.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn update_column(&mut self, column_id: &str, name: &str, position: i32) -> Result<Column, ClientError> {
        let board_id = self.board_id()?;
        self.api.update_column(&board_id, column_id, name, position).await?;
        let fresh = self.api.fetch_column(&board_id, column_id).await?;
        for column in &mut self.board_mut()?.columns {
            if column.id == column_id {
                *column = fresh.clone();
            }
        }
        debug!(%board_id, column_id, "column updated");
        self.publish();
        Ok(fresh)
    }

    /// Create a card at the caller-chosen `position`, then append the
    /// server's copy.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn add_card(&mut self, name: &str, column_id: &str, position: i32) -> Result<Card, ClientError> {
        let board_id = self.board_id()?;
        let created = self.api.create_card(&board_id, column_id, name, position).await?;
        let card = self.api.fetch_card(&board_id, column_id, &created.id).await?;
        info!(%board_id, column_id, card_id = %card.id, position, "card added");
        self.board_mut()?.cards.push(card.clone());
        self.publish();
        Ok(card)
    }

    /// Delete a card and drop it locally.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn delete_card(&mut self, card_id: &str, column_id: &str) -> Result<(), ClientError> {
        let board_id = self.board_id()?;
        self.api.delete_card(&board_id, column_id, card_id).await?;
        self.board_mut()?.cards.retain(|card| card.id != card_id);
        info!(%board_id, card_id, "card deleted");
        self.publish();
        Ok(())
    }

    /// Update a card's editable fields, then replace it with the server's
    /// copy. An open card modal for the same card is refetched too.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn update_card(
        &mut self,
        card_id: &str,
        name: &str,
        description: &str,
        cover_attachment: &str,
        column_id: &str,
    ) -> Result<Card, ClientError> {
        let board_id = self.board_id()?;
        let update = CardUpdate { name, description, cover_attachment };
        self.api.update_card(&board_id, column_id, card_id, &update).await?;
        let fresh = self.api.fetch_card(&board_id, column_id, card_id).await?;
        let modal = if self.modal_shows(card_id) {
            Some(self.api.fetch_card_detail(&board_id, card_id).await?)
        } else {
            None
        };

        for card in &mut self.board_mut()?.cards {
            if card.id == card_id {
                *card = fresh.clone();
            }
        }
        if modal.is_some() {
            self.state.card_modal = modal;
        }
        debug!(%board_id, card_id, "card updated");
        self.publish();
        Ok(fresh)
    }

    /// Swap the positions of two cards that share `column_id`, then splice
    /// both refetched records back in by id.
    ///
    /// # Errors
    ///
    /// [`ClientError::CrossColumnSwap`] if either card is not in the column,
    /// [`ClientError::CardNotFound`] if the refetch lacks one of them, or the
    /// server's error.
    pub async fn swap_cards(&mut self, first: &str, second: &str, column_id: &str) -> Result<(), ClientError> {
        let board_id = self.board_id()?;
        let in_column = |id: &str| self.state.card(id).is_some_and(|card| card.column_id == column_id);
        if !in_column(first) || !in_column(second) {
            return Err(ClientError::CrossColumnSwap {
                first: first.to_owned(),
                second: second.to_owned(),
                column_id: column_id.to_owned(),
            });
        }

        self.api.swap_cards(&board_id, column_id, first, second).await?;
        let fresh = self.api.fetch_column_cards(&board_id, column_id).await?;
        let find = |id: &str| {
            fresh
                .iter()
                .find(|card| card.id == id)
                .cloned()
                .ok_or_else(|| ClientError::CardNotFound(id.to_owned()))
        };
        let (fresh_first, fresh_second) = (find(first)?, find(second)?);

        for card in &mut self.board_mut()?.cards {
            if card.id == first {
                *card = fresh_first.clone();
            } else if card.id == second {
                *card = fresh_second.clone();
            }
        }
        info!(%board_id, column_id, first, second, "cards swapped");
        self.publish();
        Ok(())
    }

    /// Move a card to `to_position` in `to_column` (possibly its own column)
    /// and reload the whole board to pick up every shifted sibling.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn reorder_list(
        &mut self,
        from_column: &str,
        to_column: &str,
        to_position: i32,
        card_id: &str,
    ) -> Result<(), ClientError> {
        let board_id = self.board_id()?;
        self.api
            .reorder_card(&board_id, from_column, card_id, to_column, to_position)
            .await?;
        info!(%board_id, card_id, from_column, to_column, to_position, "card reordered");
        self.request_board(&board_id).await
    }

    /// Load the detail record for the card modal.
    ///
    /// # Errors
    ///
    /// Propagates the fetch error; the previous modal is kept.
    pub async fn request_card_modal(&mut self, board_id: &str, card_id: &str) -> Result<(), ClientError> {
        let detail = self.api.fetch_card_detail(board_id, card_id).await?;
        self.state.card_modal = Some(detail);
        self.publish();
        Ok(())
    }

    pub fn reset_card_modal(&mut self) {
        self.state.card_modal = None;
        self.publish();
    }

    /// Attach a file to a card and refresh the modal if it shows that card.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn upload_attachment(&mut self, card_id: &str, filename: &str, bytes: Vec<u8>) -> Result<(), ClientError> {
        let board_id = self.board_id()?;
        self.api.upload_attachment(&board_id, card_id, filename, bytes).await?;
        info!(%board_id, card_id, filename, "attachment uploaded");
        self.refresh_modal(&board_id, card_id).await
    }

    /// Remove an attachment and refresh the modal if it shows that card.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoBoard`] or the server's error.
    pub async fn delete_attachment(&mut self, card_id: &str, attachment_id: &str) -> Result<(), ClientError> {
        let board_id = self.board_id()?;
        self.api.delete_attachment(&board_id, card_id, attachment_id).await?;
        info!(%board_id, card_id, attachment_id, "attachment deleted");
        self.refresh_modal(&board_id, card_id).await
    }

    fn modal_shows(&self, card_id: &str) -> bool {
        self.state.card_modal.as_ref().is_some_and(|modal| modal.id == card_id)
    }

    async fn refresh_modal(&mut self, board_id: &str, card_id: &str) -> Result<(), ClientError> {
        if self.modal_shows(card_id) {
            self.request_card_modal(board_id, card_id).await?;
        }
        Ok(())
    }
}

// =============================================================================
// SHARED HANDLE
// =============================================================================

/// Shared, serialized access to one [`KanbanStore`].
///
/// `lock().await` queues behind any action already running; the guard stays
/// held for the full action, so at most one request is in flight.
pub struct KanbanHandle<A: ?Sized> {
    store: Arc<Mutex<KanbanStore<A>>>,
    updates: watch::Receiver<KanbanState>,
}

impl<A: ?Sized> Clone for KanbanHandle<A> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), updates: self.updates.clone() }
    }
}

impl<A: KanbanApi + ?Sized> KanbanHandle<A> {
    #[must_use]
    pub fn new(store: KanbanStore<A>) -> Self {
        let updates = store.subscribe();
        Self { store: Arc::new(Mutex::new(store)), updates }
    }

    /// Wait for exclusive access to the store.
    pub async fn lock(&self) -> MutexGuard<'_, KanbanStore<A>> {
        self.store.lock().await
    }

    /// Latest published state, without waiting on in-flight actions.
    #[must_use]
    pub fn snapshot(&self) -> KanbanState {
        self.updates.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<KanbanState> {
        self.updates.clone()
    }
}
