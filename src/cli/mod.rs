//! Command-line interface for spotify-scrobbler.
//!
//! This module provides the default ingestion run plus the authorization
//! and status commands.

mod commands;

pub use commands::{Cli, Commands, run_command};
