use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use traffic_sense_agent::AgentService;
use traffic_sense_core::config::{Config, LoggingConfig, data_dir};
use traffic_sense_gateway::GatewayState;
use traffic_sense_stream::{EventKind, Feed};

#[derive(Parser)]
#[command(
    name = "traffic-sense",
    about = "Traffic analysis agent that streams its reasoning as typed events",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one streamed turn and print its events
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show system status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the configuration, or one dotted key of it
    Show { key: Option<String> },
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    init_logging(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            tracing::info!("Starting TrafficSense gateway on port {port}");
            let state = GatewayState::from_config(config)?;
            #[cfg(feature = "metrics")]
            let state =
                state.with_metrics(traffic_sense_gateway::metrics::install_prometheus_recorder()?);
            traffic_sense_gateway::start_gateway(Arc::new(state), port).await?;
        }
        Commands::Chat { message } => {
            let service = AgentService::from_config(&config)?;
            run_chat(&service, &message).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { key: None } => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Show { key: Some(key) } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("{key}: not set"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    anyhow::bail!(
                        "{} configuration error(s) in {}",
                        errors.len(),
                        config_path.display()
                    );
                }
                println!("Config OK: {}", config_path.display());
            }
        },
        Commands::Status => {
            let models = config.models();
            let feed = config.feed_override().map(Feed::from);
            println!("TrafficSense v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Data dir: {}", data_dir().display());
            println!("Engine: {:?}", config.engine());
            println!("Feed override: {}", feed.map_or("none".to_string(), |f| f.to_string()));
            let key_status = if models.resolve_api_key().is_some() {
                "configured"
            } else {
                "missing"
            };
            println!("Provider: {:?} ({})", models.provider, models.model());
            println!("API key: {key_status}");
            println!("Gateway: {}:{}", config.gateway_bind(), config.gateway_port());
        }
    }

    Ok(())
}

/// Print answer text inline and every other event on its own numbered line.
async fn run_chat(service: &AgentService, message: &str) -> anyhow::Result<()> {
    let mut events = service.chat_stream(message).await;
    let mut counts: HashMap<EventKind, usize> = HashMap::new();
    let mut stdout = io::stdout();
    let mut inline = false;
    let mut n = 0;

    while let Some(event) = events.next().await {
        n += 1;
        *counts.entry(event.kind).or_default() += 1;
        if event.kind.is_answer() {
            write!(stdout, "{}", event.content)?;
            stdout.flush()?;
            inline = true;
            continue;
        }
        if inline {
            writeln!(stdout)?;
            inline = false;
        }
        if event.is_done() {
            break;
        }
        writeln!(stdout, "[{n}] {}: {}", event.kind.as_str().to_uppercase(), event.content)?;
    }

    let summary: Vec<String> = EventKind::ALL
        .iter()
        .filter_map(|kind| counts.get(kind).map(|c| format!("{kind}={c}")))
        .collect();
    writeln!(stdout, "\n{n} events ({})", summary.join(", "))?;
    Ok(())
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("info")
    };
    let directives = std::iter::once(level.to_string())
        .chain(logging.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let registry = tracing_subscriber::registry().with(filter);
    let to_stdout = logging.output == "stdout";
    match (logging.format == "json", to_stdout) {
        (true, true) => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stdout))
            .init(),
        (true, false) => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init(),
        (false, true) => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
            .init(),
        (false, false) => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
    }
}
