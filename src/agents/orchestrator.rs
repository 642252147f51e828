//! The three-agent team: an Orchestrator that answers the user and delegates
//! to a Researcher (literature search) and an Analyst (code execution).

use crate::agents::agent::{Agent, AgentIdentity, LoopConfig};
use crate::agents::delegation::delegation_capabilities;
use crate::llm::client::ModelBackend;
use crate::tools::analysis::{analysis_capability, CodeSandbox, ProcessSandbox};
use crate::tools::literature::{literature_capabilities, HttpLiteratureSource, LiteratureSource};
use crate::tools::registry::CapabilitySet;
use crate::types::Result;
use crate::utils::toml_config::{AssistantConfig, SecretStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const ORCHESTRATOR_INSTRUCTION: &str = "\
You are the Treg Research Assistant Orchestrator.
Your goal is to help bioinformaticians design experiments and understand Treg biology.

You have access to specialized agents:
- `ask_researcher`: For literature, facts, and protocols.
- `ask_analyst`: For calculations, data analysis, or code execution.

If the user asks for general advice or chat, answer directly.
Always be professional and scientific.";

pub const RESEARCHER_INSTRUCTION: &str = "\
You are a Researcher Agent specialized in Treg cell therapy.
Your goal is to find accurate scientific information using the provided tools.

When asked to research a topic:
1. Use `search_pubmed` to find literature.
2. Use `search_clinical_trials` to find relevant studies.
3. Synthesize the findings into a concise summary.
4. Always cite your sources (PMID or NCT ID).";

pub const ANALYST_INSTRUCTION: &str = "\
You are an Analyst Agent.
Your goal is to analyze data, perform calculations, or generate code to solve problems.

When asked to analyze something:
1. Write Python code to solve the problem.
2. Use `execute_python_code` to run it.
3. Interpret the results.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Orchestrator,
    Researcher,
    Analyst,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [
        AgentRole::Orchestrator,
        AgentRole::Researcher,
        AgentRole::Analyst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "orchestrator",
            AgentRole::Researcher => "researcher",
            AgentRole::Analyst => "analyst",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "Orchestrator",
            AgentRole::Researcher => "Researcher",
            AgentRole::Analyst => "Analyst",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "Main agent that interfaces with the user and delegates tasks.",
            AgentRole::Researcher => "Specialized agent for gathering scientific information.",
            AgentRole::Analyst => "Specialized agent for data analysis and code execution.",
        }
    }

    pub fn default_instruction(&self) -> &'static str {
        match self {
            AgentRole::Orchestrator => ORCHESTRATOR_INSTRUCTION,
            AgentRole::Researcher => RESEARCHER_INSTRUCTION,
            AgentRole::Analyst => ANALYST_INSTRUCTION,
        }
    }

    /// Identity with the built-in instruction, or `instruction` when given.
    pub fn identity(&self, instruction: Option<&str>) -> AgentIdentity {
        AgentIdentity::new(
            self.display_name(),
            self.description(),
            instruction.unwrap_or(self.default_instruction()),
        )
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model backend, identity and loop settings for one role.
#[derive(Clone)]
pub struct AgentSettings {
    pub backend: Arc<dyn ModelBackend>,
    pub identity: AgentIdentity,
    pub config: LoopConfig,
}

impl AgentSettings {
    /// Built-in identity and default loop settings for `role`.
    pub fn for_role(role: AgentRole, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend,
            identity: role.identity(None),
            config: LoopConfig::default(),
        }
    }
}

/// Build the Orchestrator with exactly `ask_researcher` and `ask_analyst`.
pub fn build_orchestrator(
    settings: AgentSettings,
    researcher: &Arc<Agent>,
    analyst: &Arc<Agent>,
) -> Result<Agent> {
    let mut capabilities = CapabilitySet::new();
    for capability in delegation_capabilities(researcher, analyst) {
        capabilities.register(capability)?;
    }
    Ok(Agent::new(
        settings.identity,
        settings.backend,
        capabilities,
        settings.config,
    ))
}

/// An Orchestrator together with the sub-agents it delegates to.
///
/// The team owns the sub-agents; the Orchestrator's delegation capabilities
/// only hold weak references to them.
#[derive(Debug, Clone)]
pub struct AgentTeam {
    pub orchestrator: Arc<Agent>,
    pub researcher: Arc<Agent>,
    pub analyst: Arc<Agent>,
}

impl AgentTeam {
    /// Wire a team from ready-made sub-agents.
    pub fn assemble(
        orchestrator: AgentSettings,
        researcher: Arc<Agent>,
        analyst: Arc<Agent>,
    ) -> Result<Self> {
        let orchestrator = Arc::new(build_orchestrator(orchestrator, &researcher, &analyst)?);
        Ok(Self {
            orchestrator,
            researcher,
            analyst,
        })
    }

    /// Build a full team with explicit collaborators.
    ///
    /// The Analyst only receives `execute_python_code` when a sandbox is given.
    pub fn build(
        orchestrator: AgentSettings,
        researcher: AgentSettings,
        analyst: AgentSettings,
        literature: Arc<dyn LiteratureSource>,
        max_results: usize,
        sandbox: Option<Arc<dyn CodeSandbox>>,
    ) -> Result<Self> {
        let mut research_caps = CapabilitySet::new();
        for capability in literature_capabilities(literature, max_results) {
            research_caps.register(capability)?;
        }
        let researcher = Arc::new(Agent::new(
            researcher.identity,
            researcher.backend,
            research_caps,
            researcher.config,
        ));

        let mut analysis_caps = CapabilitySet::new();
        if let Some(sandbox) = sandbox {
            analysis_caps.register(analysis_capability(sandbox))?;
        }
        let analyst = Arc::new(Agent::new(
            analyst.identity,
            analyst.backend,
            analysis_caps,
            analyst.config,
        ));

        Self::assemble(orchestrator, researcher, analyst)
    }

    /// Build the team described by configuration.
    pub fn from_config(config: &AssistantConfig, secrets: &SecretStore) -> Result<Self> {
        let settings = |role: AgentRole| -> Result<AgentSettings> {
            let agent = config.agent_config(role);
            let provider = config.provider_for(role, secrets)?;
            info!(
                role = %role,
                provider = provider.name(),
                model = provider.model(),
                "Configuring agent"
            );
            Ok(AgentSettings {
                backend: provider.create_backend()?,
                identity: role.identity(agent.system_instruction.as_deref()),
                config: agent.loop_config(),
            })
        };

        let literature = Arc::new(HttpLiteratureSource::from_config(&config.literature)?);
        let sandbox: Option<Arc<dyn CodeSandbox>> = if config.analysis.enabled {
            Some(Arc::new(ProcessSandbox::from_config(&config.analysis)))
        } else {
            None
        };

        Self::build(
            settings(AgentRole::Orchestrator)?,
            settings(AgentRole::Researcher)?,
            settings(AgentRole::Analyst)?,
            literature,
            config.literature.max_results,
            sandbox,
        )
    }

    pub fn agent(&self, role: AgentRole) -> &Arc<Agent> {
        match role {
            AgentRole::Orchestrator => &self.orchestrator,
            AgentRole::Researcher => &self.researcher,
            AgentRole::Analyst => &self.analyst,
        }
    }
}
