//! Kanban board and chat client.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server owns every board, column, card and message. This crate keeps a
//! local cache of what the user is looking at and talks to the server over
//! REST (`net::api`) and one websocket per open conversation
//! (`net::chat_socket`). Stores under `state` are the only code that mutates
//! the cache; they always re-read the server's answer after a write instead
//! of computing positions locally.

pub mod config;
pub mod error;
pub mod net;
pub mod state;
