//! API request handlers.

/// Chat handler.
pub mod chat;
/// Health check handler.
pub mod health;
