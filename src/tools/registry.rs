use crate::tools::schema::{CapabilityDescriptor, FunctionSpec};
use crate::types::{AppError, Result, ToolDefinition};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Synchronous capability body. Receives arguments already coerced to the schema.
pub type CapabilityFn = dyn Fn(&Map<String, Value>) -> Result<String> + Send + Sync;

/// A named, schema-described callable an agent's model may invoke.
#[derive(Clone)]
pub struct Capability {
    descriptor: CapabilityDescriptor,
    handler: Arc<CapabilityFn>,
}

impl Capability {
    /// Build a capability from function metadata and its body.
    pub fn new<F>(spec: FunctionSpec, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<String> + Send + Sync + 'static,
    {
        Self::from_descriptor(spec.describe(), handler)
    }

    pub fn from_descriptor<F>(descriptor: CapabilityDescriptor, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn definition(&self) -> ToolDefinition {
        self.descriptor.to_tool_definition()
    }

    /// Coerce `args` against the schema and run the body.
    pub fn invoke(&self, args: &Value) -> Result<String> {
        let coerced = self.descriptor.coerce_arguments(args)?;
        (self.handler)(&coerced)
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// The capability set of one agent. Names are unique; order is registration order.
#[derive(Clone, Default, Debug)]
pub struct CapabilitySet {
    capabilities: Vec<Capability>,
    index: HashMap<String, usize>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. A second capability with an existing name is rejected.
    pub fn register(&mut self, capability: Capability) -> Result<()> {
        if self.index.contains_key(capability.name()) {
            return Err(AppError::DuplicateCapability(capability.name().to_string()));
        }
        self.index
            .insert(capability.name().to_string(), self.capabilities.len());
        self.capabilities.push(capability);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, capability: Capability) -> Result<Self> {
        self.register(capability)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.index.get(name).map(|&i| &self.capabilities[i])
    }

    /// Check if a capability is registered
    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.iter().map(Capability::name).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.capabilities.iter().map(Capability::definition).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
