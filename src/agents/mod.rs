//! Agents and multi-agent orchestration
//!
//! - [`agent`] - An agent and its tool-calling loop
//! - [`delegation`] - Capabilities that forward a request to another agent
//! - [`orchestrator`] - The Orchestrator, Researcher and Analyst team

pub mod agent;
pub mod delegation;
pub mod orchestrator;

pub use agent::{Agent, AgentIdentity, FinishReason, LoopConfig, LoopResult};
pub use delegation::{ask_analyst, ask_researcher, delegate};
pub use orchestrator::{build_orchestrator, AgentRole, AgentSettings, AgentTeam};
