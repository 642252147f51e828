use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use treg::{
    api::create_router,
    cli::{output::Output, Cli, Commands},
    AgentRole, AgentTeam, AppState, AssistantConfig, SecretStore, SessionPool,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli, log_level: &str) {
    let default_level = if cli.verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("treg={0},treg_assistant={0},tower_http={0}", default_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.with_ansi(!cli.no_color).init();
    }
}

fn load_config(cli: &Cli) -> Result<AssistantConfig> {
    if cli.config.exists() {
        AssistantConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))
    } else {
        Ok(AssistantConfig::default())
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config = load_config(&cli)?;
    init_tracing(&cli, &config.server.log_level);
    if !cli.config.exists() {
        output.warning(&format!(
            "{} not found, using default configuration",
            cli.config.display()
        ));
    }
    let secrets = SecretStore::from_env();

    match cli.command {
        Commands::Ask { question, session } => {
            let team = AgentTeam::from_config(&config, &secrets)?;
            let response = team
                .orchestrator
                .query(&question, session.as_deref())
                .await;
            output.trace(&response.steps);
            output.answer(&response.answer);
            Ok(())
        }
        Commands::Serve { host, port } => serve(config, secrets, host, port, output).await,
        Commands::Config { validate } => {
            config.validate()?;
            if validate {
                output.success(&format!("{} is valid", cli.config.display()));
            } else {
                output.header("Effective configuration");
                println!("{}", config.to_toml_string()?);
            }
            Ok(())
        }
        Commands::Agents => {
            let team = AgentTeam::from_config(&config, &secrets)?;
            output.header("Agents");
            for role in AgentRole::ALL {
                let agent = team.agent(role);
                output.subheader(agent.name());
                output.kv("role", role.as_str());
                output.kv("model", &config.agent_config(role).model);
                output.kv("description", &agent.identity().description);
                for capability in agent.capabilities().iter() {
                    output.list_item(capability.name());
                }
            }
            output.newline();
            Ok(())
        }
    }
}

async fn serve(
    config: AssistantConfig,
    secrets: SecretStore,
    host: Option<String>,
    port: Option<u16>,
    output: &Output,
) -> Result<()> {
    let config = Arc::new(config);
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    // Fail fast on configuration problems before accepting requests.
    AgentTeam::from_config(&config, &secrets)?;

    let factory_config = Arc::clone(&config);
    let sessions = SessionPool::with_capacity(config.server.max_sessions, move || {
        AgentTeam::from_config(&factory_config, &secrets)
    });
    let state = AppState {
        config,
        sessions: Arc::new(sessions),
    };

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    output.banner();
    output.info(&format!("Listening on http://{}", addr));
    output.hint("Reuse the session_id from a /chat reply to keep conversation context");
    info!(%addr, "Server started");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("server error")?;
    Ok(())
}
