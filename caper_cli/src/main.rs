//! CAPER History - Capture, keep and replay lesson submissions
//!
//! Usage:
//!   caper-history list                    Show captured submissions
//!   caper-history show <ID>               Print one submission
//!   caper-history send --url <URL> ...    Submit through a capturing request API
//!   caper-history replay <ID> --page <F>  Fill a described form from a submission
//!   caper-history copy <ID>               Copy a raw payload
//!   caper-history debug <ACTION>          Debug mode and sample submissions

mod capture;
mod clipboard;
mod commands;
mod config;
mod debug;
mod history;
mod replay;
mod storage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::send::Api;
use commands::App;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "caper-history")]
#[command(author = "CAPER History Team")]
#[command(version)]
#[command(about = "Capture, keep and replay CAPER lesson submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show captured submissions
    List,

    /// Print a submission as JSON
    Show {
        /// Entry ID (or prefix)
        id: String,
    },

    /// Delete a submission
    Delete {
        /// Entry ID (or prefix)
        id: String,
    },

    /// Delete every submission
    Clear,

    /// Copy a submission's raw payload to the clipboard
    Copy {
        /// Entry ID (or prefix)
        id: String,
    },

    /// POST a lesson form through a capturing request API
    Send {
        /// Target URL, absolute or relative to the configured page
        #[arg(long)]
        url: String,

        /// Raw urlencoded body
        #[arg(long, conflicts_with = "field")]
        data: Option<String>,

        /// Form field as key=value (repeatable)
        #[arg(long = "field", required_unless_present = "data")]
        field: Vec<String>,

        /// Request API to send through
        #[arg(long, value_enum, default_value = "fetch")]
        api: Api,
    },

    /// Fill a described page from a submission
    Replay {
        /// Entry ID (or prefix)
        id: String,

        /// JSON page description
        #[arg(long)]
        page: PathBuf,

        /// Simulate pasting instead of setting values
        #[arg(long)]
        paste: bool,
    },

    /// Collapse or expand the history panel
    Panel {
        #[command(subcommand)]
        action: PanelAction,
    },

    /// Debug mode and sample submissions
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
}

#[derive(Subcommand)]
enum PanelAction {
    /// Flip between collapsed and expanded
    Toggle,
    /// Show the current state
    Status,
}

#[derive(Subcommand)]
enum DebugAction {
    /// Turn debug mode on
    Enable,
    /// Turn debug mode off
    Disable,
    /// Show whether debug mode is on
    Status,
    /// Add a single-day sample submission
    Single,
    /// Add a multi-day sample submission
    Range,
    /// Run a simulated fetch to the lesson endpoint
    Fetch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},caper_cli=info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let config = Config::load()?;
    let app = App::open(&config).await?;

    match cli.command {
        Commands::List => {
            commands::history::list(&app).await?;
        }

        Commands::Show { id } => {
            commands::history::show(&app, &id).await?;
        }

        Commands::Delete { id } => {
            commands::history::delete(&app, &id).await?;
        }

        Commands::Clear => {
            commands::history::clear(&app).await?;
        }

        Commands::Copy { id } => {
            let clipboard = clipboard::SystemClipboard::new();
            commands::history::copy(&app, &id, &clipboard).await?;
        }

        Commands::Send {
            url,
            data,
            field,
            api,
        } => {
            let opts = commands::send::SendOptions {
                url,
                data,
                fields: field,
                api,
            };
            commands::send::run(&app, opts).await?;
        }

        Commands::Replay { id, page, paste } => {
            commands::replay::run(&app, &id, &page, paste).await?;
        }

        Commands::Panel { action } => match action {
            PanelAction::Toggle => commands::panel::toggle(&app).await?,
            PanelAction::Status => commands::panel::status(&app).await?,
        },

        Commands::Debug { action } => match action {
            DebugAction::Enable => commands::debug::enable(&app).await?,
            DebugAction::Disable => commands::debug::disable(&app).await?,
            DebugAction::Status => commands::debug::status(&app).await?,
            DebugAction::Single => {
                commands::debug::push(&app, debug::DebugSample::single_day()).await?
            }
            DebugAction::Range => {
                commands::debug::push(&app, debug::DebugSample::date_range()).await?
            }
            DebugAction::Fetch => commands::debug::fetch(&app).await?,
        },
    }

    Ok(())
}
