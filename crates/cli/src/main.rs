//! Cartwise CLI, the main entry point.
//!
//! Commands:
//! - `agent`   Run one query, or chat interactively
//! - `memory`  Inspect, search or clear persisted memory
//! - `config`  Show, validate or initialize configuration
//! - `tools`   List the tool catalog
//! - `parse`   Decode a protocol line (diagnostics)

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "cartwise",
    about = "Cartwise: a product-search agent loop",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent to find products
    Agent {
        /// Run a single query instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Session id for memory scoping (random if omitted)
        #[arg(long)]
        session: Option<String>,

        /// Override agent.max_steps
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Manage persisted memory
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List available tools
    Tools,

    /// Decode a FUNCTION_CALL / FINAL_ANSWER line and print it as JSON
    Parse {
        /// The protocol line
        line: String,

        /// Fail on parameter segments without '=' instead of skipping them
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Show memory statistics
    Stats,

    /// Search memory by similarity
    Search {
        query: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Only records from this session
        #[arg(long)]
        session: Option<String>,
    },

    /// Delete all persisted memory
    Clear {
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Validate the configuration
    Validate,

    /// Write a default config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Agent {
            message,
            session,
            max_steps,
        } => commands::agent::run(message, session, max_steps).await?,
        Commands::Memory { action } => match action {
            MemoryAction::Stats => commands::memory::stats().await?,
            MemoryAction::Search {
                query,
                limit,
                session,
            } => commands::memory::search(&query, limit, session).await?,
            MemoryAction::Clear { confirm } => commands::memory::clear(confirm).await?,
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
        },
        Commands::Tools => commands::tools::run().await?,
        Commands::Parse { line, strict } => commands::parse::run(&line, strict)?,
    }

    Ok(())
}
