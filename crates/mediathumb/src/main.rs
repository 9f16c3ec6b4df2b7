//! Mediathumb CLI - Cancellable thumbnail loading from a media index.
//!
//! Mediathumb resolves `content://media/<id>` uris against a media
//! directory and runs the result through the pooled decode/cache pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Load a thumbnail and print its dimensions
//! mediathumb fetch content://media/42
//!
//! # Save a 256x256 thumbnail using the animated decoder
//! mediathumb fetch content://media/42 --width 256 --height 256 --variant animated -o thumb.png
//!
//! # View configuration
//! mediathumb config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Mediathumb - Cancellable thumbnail loading from a media index.
#[derive(Parser, Debug)]
#[command(name = "mediathumb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load one thumbnail through the pipeline
    Fetch(cli::fetch::FetchArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match mediathumb_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `mediathumb config path`."
            );
            mediathumb_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Mediathumb v{}", mediathumb_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Fetch(args) => cli::fetch::execute(args, &config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
