//! Snake Race CLI - run concurrent snake races from the terminal.

mod commands;
mod config;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::run::RunOptions;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "snake-race")]
#[command(author, version, about = "Snake Race - concurrent snakes on a shared grid", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default snake-race.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Run a race
    Run {
        /// Stop after this many ticks
        #[arg(short, long, default_value = "200")]
        ticks: u64,

        /// Number of snakes
        #[arg(short, long)]
        agents: Option<usize>,

        /// Grid width
        #[arg(long)]
        width: Option<i32>,

        /// Grid height
        #[arg(long)]
        height: Option<i32>,

        /// Tick period in milliseconds
        #[arg(short, long)]
        period_ms: Option<u64>,

        /// Draw every frame as text
        #[arg(short, long)]
        render: bool,

        /// Print final stats and frame as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { path } => commands::init::run(path),
        Commands::Run {
            ticks,
            agents,
            width,
            height,
            period_ms,
            render,
            json,
        } => {
            let options = RunOptions {
                ticks,
                agents,
                width,
                height,
                period_ms,
                render,
                json,
            };
            commands::run::run(Config::load()?, options, cli.verbose).await
        }
        Commands::Config => commands::init::show(&Config::load()?),
    }
}
