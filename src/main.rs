use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use plansmith_agent::QueryService;
use plansmith_core::config::AppConfig;
use plansmith_gateway::{AppState, GatewayServer};

const DEFAULT_CONFIG_FILE: &str = "plansmith.toml";

#[derive(Parser)]
#[command(name = "plansmith", version, about = "Plan-and-execute LLM agent backend")]
struct Cli {
    /// Path to an optional TOML config file
    #[arg(short, long, env = "PLANSMITH_CONFIG")]
    config: Option<PathBuf>,

    /// Thread ID for `run` (defaults to the shared thread)
    #[arg(short, long)]
    thread: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Answer a single prompt and exit
    Run {
        /// The prompt; read from stdin when empty
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show the resolved configuration with secrets redacted
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("plansmith=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "plansmith", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });
    let mut config = AppConfig::load(config_path.as_deref())?;
    plansmith_llm::apply_preset(&mut config.model);

    if let Some(Commands::Config) = &cli.command {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!(
        provider = %config.model.provider,
        model = %config.model.model_id,
        "Using chat model"
    );
    let llm = plansmith_llm::create_client(&config.model);
    let service = Arc::new(QueryService::from_config(llm, &config)?);

    match cli.command {
        Some(Commands::Run { prompt }) => {
            let mut text = prompt.join(" ");
            if text.trim().is_empty() {
                text = io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            let response = service.query_text(&text, cli.thread.as_deref()).await;
            println!("{}", response);
        }
        _ => {
            let server = GatewayServer::new(
                config.server.clone(),
                AppState {
                    service,
                    provider: config.model.provider,
                    model_id: config.model.model_id.clone(),
                },
            );
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
    }

    Ok(())
}
