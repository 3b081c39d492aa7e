//! GoFilm CLI - Headless tooling for the GoFilm player
//!
//! Features:
//! - Source probing (media kind, custom-player link rules, manifest summary)
//! - Scripted playback sessions against the headless engine
//! - Watch history file management
//! - Resume link decoding

use clap::{Parser, Subcommand};
use gofilm_core::headless::HeadlessCapabilities;
use std::path::PathBuf;

mod commands;
mod output;

/// GoFilm CLI - Player toolkit
#[derive(Parser)]
#[command(name = "gofilm-cli")]
#[command(author = "GoFilm Contributors")]
#[command(version)]
#[command(about = "Source probing and playback simulation for the GoFilm player", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect a source URL
    Probe {
        /// Media URL
        url: String,

        /// Fetch the manifest (or HEAD the file) and summarize it
        #[arg(long)]
        fetch: bool,
    },

    /// Run a scripted playback session against the headless engine
    Simulate {
        /// Media URL
        url: String,

        /// Resume offset in seconds
        #[arg(short, long, default_value = "0")]
        resume: f64,

        /// JSON script of engine/viewport steps
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Player configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretend the media element plays HLS itself
        #[arg(long)]
        native_hls: bool,

        /// Pretend the adaptive-stream engine is unavailable
        #[arg(long)]
        no_stream_engine: bool,
    },

    /// Manage a watch history file
    History {
        /// History file
        #[arg(long, default_value = "gofilm-history.json")]
        file: PathBuf,

        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Decode a play-page resume link
    Link {
        /// Link such as /play?id=42&source=s1&episode=3&currentTime=61.5
        link: String,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List entries, most recent first
    List,
    /// Show one entry
    Show { id: String },
    /// Remove one entry
    Remove { id: String },
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Probe { url, fetch } => {
            commands::probe(&url, fetch, &cli.format).await?;
        }
        Commands::Simulate { url, resume, script, config, native_hls, no_stream_engine } => {
            let capabilities = HeadlessCapabilities {
                stream_engine: !no_stream_engine,
                native_segmented: native_hls,
                fail_player: false,
            };
            commands::simulate(&url, resume, script, config, capabilities, &cli.format)?;
        }
        Commands::History { file, action } => match action {
            HistoryAction::List => commands::history_list(&file, &cli.format)?,
            HistoryAction::Show { id } => commands::history_show(&file, &id, &cli.format)?,
            HistoryAction::Remove { id } => commands::history_remove(&file, &id)?,
            HistoryAction::Clear => commands::history_clear(&file)?,
        },
        Commands::Link { link } => {
            commands::link(&link, &cli.format)?;
        }
    }

    Ok(())
}
