//! Model backends and conversation sessions
//!
//! This module provides a unified interface over the hosted model APIs the
//! agents talk to. Provider-specific wire formats stay inside their adapters.
//!
//! # Architecture
//!
//! - [`ModelBackend`] - The core trait that all providers implement
//! - [`Provider`] - Runtime provider selection, built from configuration
//! - [`ModelSession`] - A stateful conversation over one backend
//!
//! # Supported Providers
//!
//! - `gemini` - Google AI Studio (`generateContent`)
//! - `vertex` - Gemini models on Vertex AI
//! - `openai` - OpenAI and compatible chat-completions APIs
//! - `ollama` - Local Ollama server

/// Backend trait, provider selection and reply types.
pub mod client;
/// Gemini API and Vertex AI backend.
pub mod gemini;
/// Ollama backend.
pub mod ollama;
/// OpenAI-compatible backend.
pub mod openai;
/// Conversation session with append-only history.
pub mod session;

pub use client::{GenerationParams, ModelBackend, ModelReply, ModelRequest, Provider, TokenUsage};
pub use session::{HistoryMode, ModelSession, Outcome, TurnInput};
