//! Capabilities that forward a request to another agent.
//!
//! A delegation capability holds only a weak reference to its target so that
//! agents never keep each other alive. The target runs its own full loop with
//! its own history; only the target's answer text is returned to the caller.

use crate::agents::agent::Agent;
use crate::tools::registry::Capability;
use crate::tools::schema::FunctionSpec;
use crate::types::AppError;
use crate::utils::sync_bridge::run_sync;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::info;

/// Routing description for the researcher delegation capability.
pub const ASK_RESEARCHER_DOC: &str = "\
Delegates a research question to the Researcher Agent.
Use this when you need to find scientific facts, papers, or clinical trials.

Args:
    question: The research question to investigate.";

/// Routing description for the analyst delegation capability.
pub const ASK_ANALYST_DOC: &str = "\
Delegates a data analysis or calculation task to the Analyst Agent.
Use this when you need to calculate stats, plot data, or run code.

Args:
    task: The analysis or calculation to perform.";

/// Build a capability named `name` taking one string parameter `param` that
/// forwards the value to `target` and returns its answer text.
pub fn delegate(target: &Arc<Agent>, name: &str, param: &str, doc: &str) -> Capability {
    let weak: Weak<Agent> = Arc::downgrade(target);
    let param_name = param.to_string();
    let spec = FunctionSpec::new(name).doc(doc).param::<str>(param);

    Capability::new(spec, move |args: &Map<String, Value>| {
        let input = args
            .get(&param_name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let agent = weak.upgrade().ok_or_else(|| {
            AppError::CapabilityExecution("delegate agent is no longer available".to_string())
        })?;

        info!(target_agent = %agent.name(), "Delegating request");
        let response = run_sync(async move { Ok(agent.query(&input, None).await) })?;
        Ok(response.answer)
    })
}

/// `ask_researcher(question)`
pub fn ask_researcher(researcher: &Arc<Agent>) -> Capability {
    delegate(researcher, "ask_researcher", "question", ASK_RESEARCHER_DOC)
}

/// `ask_analyst(task)`
pub fn ask_analyst(analyst: &Arc<Agent>) -> Capability {
    delegate(analyst, "ask_analyst", "task", ASK_ANALYST_DOC)
}

/// Both delegation capabilities, researcher first.
pub fn delegation_capabilities(researcher: &Arc<Agent>, analyst: &Arc<Agent>) -> Vec<Capability> {
    vec![ask_researcher(researcher), ask_analyst(analyst)]
}
