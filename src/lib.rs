//! # Treg Research Assistant
//!
//! A multi-agent question-answering core for regulatory T cell research. An
//! Orchestrator agent talks to the user and delegates to two sub-agents:
//!
//! - a Researcher that searches PubMed and ClinicalTrials.gov
//! - an Analyst that runs Python snippets in a sandboxed child process
//!
//! Every agent is a [`ModelSession`](llm::ModelSession) plus a fixed
//! [`CapabilitySet`](tools::CapabilitySet), driven by a tool-calling loop that
//! records each capability invocation as a [`TraceStep`](types::TraceStep).
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use treg::{AgentTeam, AssistantConfig, SecretStore};
//!
//! let config = AssistantConfig::load("treg.toml")?;
//! let team = AgentTeam::from_config(&config, &SecretStore::from_env())?;
//!
//! let response = team.orchestrator.query("What stabilises FOXP3 expression?", None).await;
//! println!("{}", response.answer);
//! for step in &response.steps {
//!     println!("{} -> {}", step.capability_name, step.result);
//! }
//! ```
//!
//! Synchronous callers use [`Agent::query_blocking`](agents::Agent::query_blocking),
//! which works both inside and outside a Tokio runtime.
//!
//! ## Modules
//!
//! - [`agents`] - Agents, the tool-calling loop, delegation and the team
//! - [`api`] - HTTP handlers and routes
//! - [`llm`] - Model backends and sessions
//! - [`tools`] - Capability descriptors, sets and the domain capabilities
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and the sync/async bridge

#![warn(rustdoc::missing_crate_level_docs)]

/// Agents and multi-agent orchestration.
pub mod agents;
/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Model backends and conversation sessions.
pub mod llm;
/// Capabilities and capability sets.
pub mod tools;
/// Core types (responses, messages, errors).
pub mod types;
/// Configuration and the sync/async bridge.
pub mod utils;

// Re-export commonly used types
pub use agents::{Agent, AgentRole, AgentTeam};
pub use api::SessionPool;
pub use llm::{ModelBackend, ModelSession, Provider};
pub use tools::{Capability, CapabilitySet, FunctionSpec};
pub use types::{AppError, QueryResponse, Result, TraceStep};
pub use utils::run_sync;
pub use utils::toml_config::{AssistantConfig, SecretStore};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<AssistantConfig>,
    /// One agent team per chat session
    pub sessions: Arc<SessionPool>,
}
