//! HTTP API Handlers and Routes
//!
//! A thin axum layer over the Orchestrator.
//!
//! # API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `POST /chat` - Ask the Orchestrator a question within a session
//!
//! Every `session_id` gets its own [`AgentTeam`](crate::agents::AgentTeam), created on
//! first use. A request without a `session_id` starts a new session. The pool
//! keeps at most `[server].max_sessions` teams and drops the least recently used.

/// Request handlers.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
/// Per-session agent teams.
pub mod sessions;

pub use routes::create_router;
pub use sessions::SessionPool;
