//! Networking modules for the REST API and the chat socket.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` handles REST calls, `chat_socket` manages the websocket lifecycle,
//! and `types` defines the shared wire schema.

pub mod api;
pub mod chat_socket;
pub mod types;

// =============================================================================
// TEST HELPERS
// =============================================================================
