//! Capabilities: the callables an agent's model may invoke
//!
//! # Module Structure
//!
//! - [`schema`](crate::tools::schema) - Capability descriptors built from function metadata,
//!   plus argument coercion against them
//! - [`registry`](crate::tools::registry) - [`Capability`](registry::Capability) and the
//!   per-agent [`CapabilitySet`](registry::CapabilitySet)
//! - [`literature`](crate::tools::literature) - PubMed and ClinicalTrials.gov search
//! - [`analysis`](crate::tools::analysis) - Code execution in a child-process sandbox
//!
//! Capability bodies are synchronous. Bodies that need async work drive it
//! through [`run_sync`](crate::utils::sync_bridge::run_sync).

/// Code execution for the Analyst.
pub mod analysis;
/// Literature search for the Researcher.
pub mod literature;
/// Capabilities and capability sets.
pub mod registry;
/// Descriptor builder and argument coercion.
pub mod schema;

pub use registry::{Capability, CapabilitySet};
pub use schema::{CapabilityDescriptor, FunctionSpec, ParamType, ParameterDescriptor};
