//! CLI command definitions and dispatch.
//!
//! This module provides the command-line interface for spotify-scrobbler.
//! Each subcommand is implemented in its own submodule:
//! - `ingest`: the default scrobbling run
//! - `auth`: one-time authorization against the Spotify accounts service
//! - `status`: a summary of what is stored

mod auth;
mod ingest;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::runtime::{Builder, Runtime};

use crate::config::{self, DEFAULT_SETTINGS_FILE};

pub use auth::{cmd_auth_url, cmd_authorize};
pub use ingest::cmd_ingest;
pub use status::cmd_status;

/// Spotify Scrobbler CLI
///
/// Without a command, fetches recent plays and stores the new ones.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (TOML)
    #[arg(
        long = "settings-file",
        alias = "settings_file",
        default_value = DEFAULT_SETTINGS_FILE,
        global = true
    )]
    pub settings_file: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the URL to open to authorize this application
    AuthUrl,
    /// Exchange an authorization code and save the refresh token
    Authorize {
        /// The `code` parameter from the redirect URL
        code: String,
    },
    /// Show stored row counts and the latest play
    Status,
}

/// Run the specified CLI command, or an ingestion run if none was given.
///
/// Settings are loaded and validated before the store or the provider is
/// touched.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let path = config::resolve_path(&cli.settings_file);
    let settings = config::load(&path)?;
    let rt = runtime()?;

    match &cli.command {
        None => cmd_ingest(&rt, &path, settings),
        Some(Commands::AuthUrl) => cmd_auth_url(&settings),
        Some(Commands::Authorize { code }) => cmd_authorize(&rt, &path, settings, code),
        Some(Commands::Status) => cmd_status(&rt, &settings),
    }
}

/// Single-threaded runtime; a run awaits every call in sequence.
fn runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// `word` with an `s` unless `count` is exactly one.
pub(crate) fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
