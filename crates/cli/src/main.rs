//! ragline CLI
//!
//! Main entry point for the ragline command-line tool.
//! Ingests documents into a vector store and answers questions from them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, DropCollectionCommand, IngestCommand, SearchCommand, StatsCommand};
use ragline_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// ragline - grounded answers from your own documents
#[derive(Parser, Debug)]
#[command(name = "ragline")]
#[command(about = "Ingest documents and answer questions from them", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGLINE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.ragline/config.yaml)
    #[arg(short, long, global = true, env = "RAGLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "RAGLINE_MODEL")]
    model: Option<String>,

    /// Base collection name
    #[arg(long, global = true, env = "RAGLINE_COLLECTION")]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest files and directories
    Ingest(IngestCommand),

    /// Answer a question from the ingested documents
    Ask(AskCommand),

    /// Show the chunks that best match a query
    Search(SearchCommand),

    /// Show collection statistics
    Stats(StatsCommand),

    /// Delete a collection
    DropCollection(DropCollectionCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace, cli.config)?.with_overrides(
        None,
        cli.model,
        cli.collection,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(
        config.logging.level.as_deref(),
        config.no_color(),
        config.logging.format,
    )?;

    tracing::info!("ragline starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Config file: {:?}", config.config_file);

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Search(_) => "search",
        Commands::Stats(_) => "stats",
        Commands::DropCollection(_) => "drop-collection",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::DropCollection(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
