//! switchyard CLI, the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `config show`: Print the effective configuration (secrets redacted)
//! - `config default`: Print the default configuration file
//! - `config validate`: Load and validate the configuration
//! - `config path`: Print the configuration file path

use clap::{Parser, Subcommand};
use switchyard_config::{AppConfig, LogFormat};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

mod commands;

#[derive(Parser)]
#[command(
    name = "switchyard",
    about = "switchyard: routes conversational turns between a classifier and capabilities",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Print the default configuration as TOML
    Default,
    /// Load the configuration and report problems
    Validate,
    /// Print the path of the configuration file
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // `config default` must work even when the current config is broken.
    if let Commands::Config {
        action: ConfigAction::Default,
    } = cli.command
    {
        return commands::config_cmd::default();
    }

    // The configured subscriber needs the config; anything logged while
    // loading it goes to a plain stderr subscriber instead.
    let config = tracing::subscriber::with_default(
        bootstrap_subscriber(cli.verbose, std::io::stderr),
        AppConfig::load,
    );
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging.level, logging.format, cli.verbose);

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config?, host, port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config?)?,
            ConfigAction::Validate => commands::config_cmd::validate(config)?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Default => commands::config_cmd::default()?,
        },
    }

    Ok(())
}

/// `RUST_LOG` wins over `level`; `--verbose` forces `debug`.
fn env_filter(level: &str, verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { level };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn bootstrap_subscriber<W>(verbose: bool, writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("info", verbose))
        .with_target(false)
        .with_writer(writer)
        .finish()
}

fn init_tracing(level: &str, format: LogFormat, verbose: bool) {
    let filter = env_filter(level, verbose);

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}
