//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use milesdesk_core::{QualificationTools, Reply, build_assistant, ingest_knowledge};
use milesdesk_mcp::{MCP_PATH, QualificationMcpServer};
use milesdesk_rag::IngestProgress;
use milesdesk_shared::{AppConfig, MemoryId, Source, init_config, load_config, load_config_from};
use milesdesk_web::AppState;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Milesdesk: ask how to reach airline status.
#[derive(Parser)]
#[command(
    name = "milesdesk",
    version,
    about = "Answer Flying Blue and Miles & More status qualification questions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.milesdesk/milesdesk.toml).
    #[arg(long, env = "MILESDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// MCP transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Transport {
    Stdio,
    Http,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the web form (and the MCP endpoint unless disabled).
    Serve {
        /// Bind address (overrides `server.host`).
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides `server.port`).
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not mount the MCP endpoint.
        #[arg(long)]
        no_mcp: bool,
    },

    /// Answer one question and exit.
    Ask {
        /// The question.
        question: String,
    },

    /// Fetch, split and embed all sources and report segment counts.
    Ingest,

    /// MCP server operations.
    #[command(name = "mcp")]
    Mcp {
        #[command(subcommand)]
        action: McpAction,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// MCP server subcommands.
#[derive(Subcommand)]
pub(crate) enum McpAction {
    /// Serve the qualification tools over MCP.
    Serve {
        /// Transport: stdio or http.
        #[arg(long, value_enum, default_value = "stdio")]
        transport: Transport,

        /// Port for HTTP transport.
        #[arg(long, default_value = "3100")]
        port: u16,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
///
/// Logs go to stderr so stdout stays clean for answers and MCP stdio.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "milesdesk=info,tower_http=info",
        1 => "milesdesk=debug,tower_http=debug",
        _ => "milesdesk=trace,tower_http=trace,rmcp=debug",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Serve { host, port, no_mcp } => {
            let mut config = load(config_path.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if no_mcp {
                config.server.mcp_enabled = false;
            }
            cmd_serve(&config).await
        }
        Command::Ask { question } => cmd_ask(&load(config_path.as_deref())?, &question).await,
        Command::Ingest => cmd_ingest(&load(config_path.as_deref())?).await,
        Command::Mcp { action } => match action {
            McpAction::Serve { transport, port } => {
                cmd_mcp_serve(&load(config_path.as_deref())?, transport, port).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| eyre!("invalid address {}:{}: {e}", config.server.host, config.server.port))?;

    let progress = CliProgress::new();
    let assistant = build_assistant(config, &progress).await?;
    progress.finish();

    let mcp = if config.server.mcp_enabled {
        let tools = QualificationTools::from_config(config)?;
        info!(path = MCP_PATH, "MCP endpoint enabled");
        Some(QualificationMcpServer::new(tools).router())
    } else {
        None
    };

    let state = AppState::new(Arc::new(assistant), config.server.error_message.as_str());
    let app = milesdesk_web::app(state, mcp);

    println!("Milesdesk listening on http://{addr}");
    milesdesk_web::serve(addr, app).await?;
    Ok(())
}

async fn cmd_ask(config: &AppConfig, question: &str) -> Result<()> {
    let progress = CliProgress::new();
    let assistant = build_assistant(config, &progress).await?;
    progress.finish();

    match assistant.answer(&MemoryId::new(), question).await {
        Ok(Reply::Answered { text }) => println!("{text}"),
        Ok(Reply::Rejected { message }) => println!("{message}"),
        Err(e) => {
            error!(error = %e, "failed to answer question");
            println!("{}", config.server.error_message);
        }
    }
    Ok(())
}

async fn cmd_ingest(config: &AppConfig) -> Result<()> {
    config.validate()?;
    info!(sources = config.sources.len(), "ingesting sources");

    let progress = CliProgress::new();
    let kb = ingest_knowledge(config, &progress).await?;
    progress.finish();

    println!();
    for source in &kb.report.sources {
        println!("  {:<40} {} segments", source.source.label(), source.segments);
    }
    for (source, error) in &kb.report.failures {
        println!("  {:<40} failed: {error}", source.label());
    }
    println!();
    println!("  Total: {} segments", kb.report.total_segments());
    println!();

    Ok(())
}

async fn cmd_mcp_serve(config: &AppConfig, transport: Transport, port: u16) -> Result<()> {
    let server = QualificationMcpServer::new(QualificationTools::from_config(config)?);

    info!(?transport, port, "starting MCP server");
    match transport {
        Transport::Stdio => server.serve_stdio().await?,
        Transport::Http => {
            let addr: SocketAddr = format!("{}:{port}", config.server.host)
                .parse()
                .map_err(|e| eyre!("invalid address {}:{port}: {e}", config.server.host))?;
            eprintln!("Serving MCP on http://{addr}{MCP_PATH}");
            server.serve_http(addr).await?;
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Ingestion progress as an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl IngestProgress for CliProgress {
    fn source_started(&self, source: &Source) {
        self.spinner.set_message(format!("Embedding {}", source.label()));
    }

    fn source_done(&self, source: &Source, segments: usize) {
        self.spinner
            .println(format!("  {} ({segments} segments)", source.label()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_overrides() {
        let cli = Cli::try_parse_from(["milesdesk", "serve", "--port", "9000", "--no-mcp"]).unwrap();
        match cli.command {
            Command::Serve { host, port, no_mcp } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
                assert!(no_mcp);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn parses_mcp_http_transport() {
        let cli = Cli::try_parse_from(["milesdesk", "mcp", "serve", "--transport", "http"]).unwrap();
        match cli.command {
            Command::Mcp {
                action: McpAction::Serve { transport, port },
            } => {
                assert_eq!(transport, Transport::Http);
                assert_eq!(port, 3100);
            }
            _ => panic!("expected mcp serve"),
        }
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(Cli::try_parse_from(["milesdesk", "mcp", "serve", "--transport", "sse"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["milesdesk", "ask", "Gold?", "-vv", "--log-format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
