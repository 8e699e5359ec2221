//! # myclaw
//!
//! Command-line front-end: wires configuration, the runtime, and the
//! terminal approval prompt together.

#![deny(unsafe_code)]

mod approval;
mod chat;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// myclaw — a coding agent for your workspace.
#[derive(Parser, Debug)]
#[command(name = "myclaw", version, about = "A coding agent for your workspace")]
struct Cli {
    /// Log filter when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single task and print the result.
    Run {
        /// The task to hand to the agent.
        task: String,
    },
    /// Interactive chat session.
    Chat {
        /// Resume a persisted session (`latest`, a 1-based index, or an ID).
        #[arg(long)]
        resume: Option<String>,
    },
    /// Print the effective configuration.
    Config,
    /// Check provider, workspace, and check-tool availability.
    Doctor,
    /// Initialize the state directory.
    Init,
}

fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_subscriber(&cli.log_level);

    let config = myclaw_settings::load()?;
    match cli.command {
        Command::Run { task } => commands::run(config, &task).await,
        Command::Chat { resume } => chat::chat(config, resume.as_deref()).await,
        Command::Config => commands::show_config(&config),
        Command::Doctor => commands::doctor(&config).await,
        Command::Init => commands::init(&config),
    }
}
