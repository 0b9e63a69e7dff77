mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::{activity::ActivitySubcommand, config::ConfigSubcommand, token::TokenSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gatewarden",
    about = "Proximity-token gate controller — daemon, manual commands, token management",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./config.yaml, ~/.gatewarden/config.yaml, /etc/gatewarden/config.yaml)
    #[arg(long, short = 'c', global = true, env = "GATEWARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run the gate daemon (detection relay, status poller, auto-close)
    Run {
        /// Read detection events as JSON lines from stdin
        #[arg(long)]
        relay_stdin: bool,
    },

    /// Open the gate
    Open,

    /// Close the gate
    Close,

    /// Show gate state and session snapshot
    Status,

    /// Manage registered tokens
    Token {
        #[command(subcommand)]
        subcommand: TokenSubcommand,
    },

    /// Inspect the activity log
    Activity {
        #[command(subcommand)]
        subcommand: ActivitySubcommand,
    },

    /// Validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Force a director token refresh against the cloud auth path
    RefreshToken,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Init => cmd::init::run(config),
        Commands::Run { relay_stdin } => cmd::run::run(config, relay_stdin),
        Commands::Open => cmd::gate::open(config, cli.json),
        Commands::Close => cmd::gate::close(config, cli.json),
        Commands::Status => cmd::gate::status(config, cli.json),
        Commands::Token { subcommand } => cmd::token::run(config, subcommand, cli.json),
        Commands::Activity { subcommand } => cmd::activity::run(config, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
        Commands::RefreshToken => cmd::refresh::run(config),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
