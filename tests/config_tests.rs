//! Loading configuration files from disk.

use std::io::Write;
use treg::agents::AgentRole;
use treg::llm::{HistoryMode, Provider};
use treg::utils::toml_config::{AssistantConfig, ConfigError, SecretStore};

const LAB_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 8100

[providers.openai]
type = "openai"
api_key_env = "LAB_OPENAI_KEY"

[providers.local]
type = "ollama"

[models.default]
provider = "openai"
model = "gpt-4o-mini"

[models.local]
provider = "local"
model = "qwen2.5:7b"
max_tokens = 1024

[agents.orchestrator]
model = "default"
max_capability_rounds = 4

[agents.researcher]
model = "local"
history = "single_turn"

[literature]
email = "lab@example.org"
max_results = 3

[analysis]
enabled = false
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_from_file() {
    let file = write_config(LAB_CONFIG);
    let config = AssistantConfig::load(file.path()).unwrap();

    assert_eq!(config.server.port, 8100);
    assert_eq!(config.literature.max_results, 3);
    assert!(!config.analysis.enabled);

    let researcher = config.agent_config(AgentRole::Researcher);
    assert_eq!(researcher.model, "local");
    assert_eq!(researcher.loop_config().history_mode, HistoryMode::SingleTurn);

    // No [agents.analyst] section: falls back to the orchestrator's model.
    assert_eq!(config.agent_config(AgentRole::Analyst).model, "default");
    assert_eq!(
        config.agent_config(AgentRole::Orchestrator).max_capability_rounds,
        4
    );
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = AssistantConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound(_)));
}

#[test]
fn test_invalid_file_is_parse_error() {
    let file = write_config("[server\nport = ");
    let err = AssistantConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn test_dangling_model_reference() {
    let file = write_config(
        r#"
[agents.orchestrator]
model = "missing"
"#,
    );
    let err = AssistantConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingModel(ref m, _) if m == "missing"));
}

#[test]
fn test_secrets_resolve_providers() {
    let config = AssistantConfig::from_toml_str(LAB_CONFIG).unwrap();

    let err = config
        .provider_for(AgentRole::Orchestrator, &SecretStore::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingSecret(ref name) if name == "LAB_OPENAI_KEY"));

    let secrets = SecretStore::from_pairs([("LAB_OPENAI_KEY", "sk-lab")]);
    match config.provider_for(AgentRole::Orchestrator, &secrets).unwrap() {
        Provider::OpenAI { api_key, model, .. } => {
            assert_eq!(api_key, "sk-lab");
            assert_eq!(model, "gpt-4o-mini");
        }
        other => panic!("unexpected provider {:?}", other),
    }

    // Ollama needs no secret at all.
    let researcher = config
        .provider_for(AgentRole::Researcher, &SecretStore::default())
        .unwrap();
    assert_eq!(researcher.name(), "Ollama");
    assert_eq!(researcher.model(), "qwen2.5:7b");
}

#[test]
fn test_effective_config_round_trips() {
    let config = AssistantConfig::from_toml_str(LAB_CONFIG).unwrap();
    let rendered = config.to_toml_string().unwrap();
    let reparsed = AssistantConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(reparsed.server.port, config.server.port);
    assert_eq!(reparsed.models, config.models);
}
