//! TOML-based configuration for the Treg research assistant
//!
//! This module provides declarative configuration for providers, models,
//! agents and the domain capabilities via a TOML file (`treg.toml`).
//!
//! Configuration only *names* secrets (environment variables). Their values
//! are resolved once at the process boundary into a [`SecretStore`] and
//! handed to [`AssistantConfig::provider_for`].

use crate::agents::orchestrator::AgentRole;
use crate::agents::LoopConfig;
use crate::llm::client::{GenerationParams, Provider};
use crate::llm::gemini::DEFAULT_GEMINI_BASE;
use crate::llm::session::HistoryMode;
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from treg.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Named LLM provider configurations
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default = "default_models")]
    pub models: HashMap<String, ModelConfig>,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub literature: LiteratureConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: default_providers(),
            models: default_models(),
            agents: AgentsConfig::default(),
            literature: LiteratureConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Most chat sessions kept in memory; the least recently used is dropped first
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_sessions() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_sessions: default_max_sessions(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Gemini {
        /// Environment variable containing the API key
        #[serde(default = "default_gemini_key_env")]
        api_key_env: String,
        #[serde(default = "default_gemini_base")]
        base_url: String,
    },
    Vertex {
        project: String,
        #[serde(default = "default_vertex_location")]
        location: String,
        /// Environment variable containing an OAuth access token
        #[serde(default = "default_vertex_token_env")]
        access_token_env: String,
    },
    OpenAI {
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
}

fn default_gemini_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_gemini_base() -> String {
    DEFAULT_GEMINI_BASE.to_string()
}

fn default_vertex_location() -> String {
    "us-central1".to_string()
}

fn default_vertex_token_env() -> String {
    "VERTEX_ACCESS_TOKEN".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_providers() -> HashMap<String, ProviderConfig> {
    HashMap::from([(
        "gemini".to_string(),
        ProviderConfig::Gemini {
            api_key_env: default_gemini_key_env(),
            base_url: default_gemini_base(),
        },
    )])
}

// ============= Model Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_model_max_tokens() -> u32 {
    2048
}

fn default_models() -> HashMap<String, ModelConfig> {
    HashMap::from([(
        default_model_ref(),
        ModelConfig {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            temperature: default_temperature(),
            max_tokens: default_model_max_tokens(),
        },
    )])
}

impl ModelConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub orchestrator: AgentConfig,

    /// Falls back to the orchestrator's model when absent
    #[serde(default)]
    pub researcher: Option<AgentConfig>,

    /// Falls back to the orchestrator's model when absent
    #[serde(default)]
    pub analyst: Option<AgentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Reference to a model name defined in [models]
    #[serde(default = "default_model_ref")]
    pub model: String,

    /// Replaces the built-in system instruction for this role
    #[serde(default)]
    pub system_instruction: Option<String>,

    #[serde(default = "default_max_capability_rounds")]
    pub max_capability_rounds: usize,

    #[serde(default)]
    pub history: HistoryMode,

    #[serde(default = "default_capability_timeout")]
    pub capability_timeout_secs: u64,
}

fn default_model_ref() -> String {
    "default".to_string()
}

fn default_max_capability_rounds() -> usize {
    5
}

fn default_capability_timeout() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model_ref(),
            system_instruction: None,
            max_capability_rounds: default_max_capability_rounds(),
            history: HistoryMode::default(),
            capability_timeout_secs: default_capability_timeout(),
        }
    }
}

impl AgentConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            max_capability_rounds: self.max_capability_rounds,
            capability_timeout: Duration::from_secs(self.capability_timeout_secs),
            history_mode: self.history,
        }
    }
}

// ============= Capability Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiteratureConfig {
    /// Contact address sent to NCBI with every E-utilities request
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_eutils_base")]
    pub eutils_base: String,

    #[serde(default = "default_trials_base")]
    pub clinical_trials_base: String,
}

fn default_max_results() -> usize {
    5
}

fn default_eutils_base() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_trials_base() -> String {
    "https://clinicaltrials.gov/api/v2".to_string()
}

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            email: None,
            max_results: default_max_results(),
            eutils_base: default_eutils_base(),
            clinical_trials_base: default_trials_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_true() -> bool {
    true
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_analysis_timeout() -> u64 {
    30
}

fn default_max_output_bytes() -> usize {
    20_000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interpreter: default_interpreter(),
            timeout_secs: default_analysis_timeout(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

// ============= Secrets =============

/// Secret values resolved at the process boundary.
#[derive(Clone, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    /// Snapshot the process environment. Call once, from `main`.
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .map(str::to_string)
            .ok_or_else(|| ConfigError::MissingSecret(name.to_string()))
    }
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore")
            .field("entries", &self.values.len())
            .finish_non_exhaustive()
    }
}

// ============= Errors =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Secret '{0}' referenced in config is not set")]
    MissingSecret(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' referenced by agent '{1}' does not exist")]
    MissingModel(String, String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl AssistantConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AssistantConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, model) in &self.models {
            if !self.providers.contains_key(&model.provider) {
                return Err(ConfigError::MissingProvider(
                    model.provider.clone(),
                    name.clone(),
                ));
            }
            if model.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "model '{}' must allow at least one output token",
                    name
                )));
            }
        }

        for role in AgentRole::ALL {
            let agent = self.agent_config(role);
            if !self.models.contains_key(&agent.model) {
                return Err(ConfigError::MissingModel(
                    agent.model.clone(),
                    role.as_str().to_string(),
                ));
            }
            if agent.max_capability_rounds == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' needs max_capability_rounds >= 1",
                    role.as_str()
                )));
            }
            if agent.capability_timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' needs capability_timeout_secs >= 1",
                    role.as_str()
                )));
            }
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "server.max_sessions must be at least 1".to_string(),
            ));
        }

        if self.literature.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "literature.max_results must be at least 1".to_string(),
            ));
        }
        if self.analysis.enabled
            && (self.analysis.timeout_secs == 0 || self.analysis.max_output_bytes == 0)
        {
            return Err(ConfigError::ValidationError(
                "analysis.timeout_secs and analysis.max_output_bytes must be positive"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Effective agent configuration for a role.
    ///
    /// Sub-agents without their own section use the orchestrator's model with
    /// default loop settings.
    pub fn agent_config(&self, role: AgentRole) -> AgentConfig {
        let own = match role {
            AgentRole::Orchestrator => return self.agents.orchestrator.clone(),
            AgentRole::Researcher => self.agents.researcher.as_ref(),
            AgentRole::Analyst => self.agents.analyst.as_ref(),
        };
        own.cloned().unwrap_or_else(|| AgentConfig {
            model: self.agents.orchestrator.model.clone(),
            ..AgentConfig::default()
        })
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn get_model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.get(name)
    }

    /// Resolve the provider (with secrets) that serves a role.
    pub fn provider_for(
        &self,
        role: AgentRole,
        secrets: &SecretStore,
    ) -> Result<Provider, ConfigError> {
        let agent = self.agent_config(role);
        let model = self.get_model(&agent.model).ok_or_else(|| {
            ConfigError::MissingModel(agent.model.clone(), role.as_str().to_string())
        })?;
        let provider = self.get_provider(&model.provider).ok_or_else(|| {
            ConfigError::MissingProvider(model.provider.clone(), agent.model.clone())
        })?;

        let params = model.params();
        Ok(match provider {
            ProviderConfig::Gemini {
                api_key_env,
                base_url,
            } => Provider::Gemini {
                api_key: secrets.require(api_key_env)?,
                base_url: base_url.clone(),
                model: model.model.clone(),
                params,
            },
            ProviderConfig::Vertex {
                project,
                location,
                access_token_env,
            } => Provider::Vertex {
                project: project.clone(),
                location: location.clone(),
                access_token: secrets.require(access_token_env)?,
                model: model.model.clone(),
                params,
            },
            ProviderConfig::OpenAI {
                api_key_env,
                api_base,
            } => Provider::OpenAI {
                api_key: secrets.require(api_key_env)?,
                api_base: api_base.clone(),
                model: model.model.clone(),
                params,
            },
            ProviderConfig::Ollama { base_url } => Provider::Ollama {
                base_url: base_url.clone(),
                model: model.model.clone(),
                params,
            },
        })
    }
}
