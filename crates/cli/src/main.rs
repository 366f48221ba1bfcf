//! ClawLoop CLI — the main entry point.
//!
//! Commands:
//! - `tools`   — List the built-in tool registry
//! - `run`     — Run the single-agent tool loop on a prompt
//! - `plan`    — Run the plan-execute pipeline on a goal
//! - `config`  — Print the effective configuration
//!
//! Model replies come from a script file (a JSON array of strings), which
//! is replayed in order.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "clawloop",
    about = "ClawLoop — agent execution engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.clawloop/config.toml
    #[arg(short, long, global = true, env = "CLAWLOOP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show registry statistics and tool descriptions
    Tools {
        /// Only list tools in this category
        #[arg(long)]
        category: Option<String>,

        /// Print each tool's full description
        #[arg(short, long)]
        describe: bool,
    },

    /// Run the tool-using agent loop on a prompt
    Run {
        /// JSON array of canned model replies
        #[arg(short, long)]
        script: PathBuf,

        /// Override agent.max_iterations
        #[arg(long)]
        max_iterations: Option<u32>,

        prompt: String,
    },

    /// Plan toward a goal, execute the plan, and answer
    Plan {
        /// JSON array of canned model replies
        #[arg(short, long)]
        script: PathBuf,

        /// Answer with the last step's output instead of asking the model
        #[arg(long)]
        no_synthesis: bool,

        goal: String,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        defaults: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Tools { category, describe } => {
            commands::tools::run(category.as_deref(), describe)?
        }
        Commands::Run {
            script,
            max_iterations,
            prompt,
        } => commands::run::run(config_path, &script, max_iterations, &prompt).await?,
        Commands::Plan {
            script,
            no_synthesis,
            goal,
        } => commands::plan::run(config_path, &script, no_synthesis, &goal).await?,
        Commands::Config { defaults } => commands::config_cmd::show(config_path, defaults)?,
    }

    Ok(())
}
