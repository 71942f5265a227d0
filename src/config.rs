//! Settings loaded from a TOML file.
//!
//! The settings file is looked up at the path given on the command line
//! (default `settings.toml` in the working directory). When that relative
//! path does not exist, the OS-standard config directory is tried:
//! - Windows: %APPDATA%\spotify-scrobbler\settings.toml
//! - macOS: ~/Library/Application Support/spotify-scrobbler/settings.toml
//! - Linux: ~/.config/spotify-scrobbler/settings.toml
//!
//! ```toml
//! db_location = "scrobbles.db"
//!
//! [spotify]
//! client_id = "..."
//! client_secret = "..."
//! redirect_uri = "http://localhost:1410/"
//! scope = "user-read-recently-played"
//! refresh_token = "..."   # written by `spotify-scrobbler authorize <code>`
//! ```
//!
//! Unlike a UI preference file, missing or contradictory settings are fatal:
//! nothing touches the store or the provider until [`Settings::validate`] passes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings file used when none is given.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Scope needed to read the play history.
pub const REQUIRED_SCOPE: &str = "user-read-recently-played";

/// Redirect URI registered for the local authorization flow.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:1410/";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite database file
    pub db_location: String,

    /// Provider credentials
    pub spotify: SpotifyCredentials,
}

/// Spotify application credentials and the user's refresh token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Space-separated OAuth scopes
    pub scope: String,
    /// Obtained once through the authorization-code flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Default for SpotifyCredentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: REQUIRED_SCOPE.to_string(),
            refresh_token: None,
        }
    }
}

impl Settings {
    /// Check that every required key is present and consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_location.trim().is_empty() {
            return Err(ConfigError::Missing("db_location"));
        }
        if self.spotify.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("spotify.client_id"));
        }
        if self.spotify.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("spotify.client_secret"));
        }
        if self.spotify.redirect_uri.trim().is_empty() {
            return Err(ConfigError::Missing("spotify.redirect_uri"));
        }
        if !self
            .spotify
            .scope
            .split_whitespace()
            .any(|s| s == REQUIRED_SCOPE)
        {
            return Err(ConfigError::Invalid(format!(
                "scope \"{}\" does not include {}",
                self.spotify.scope, REQUIRED_SCOPE
            )));
        }
        Ok(())
    }

    /// The refresh token, required before any ingestion run.
    pub fn refresh_token(&self) -> Result<&str, ConfigError> {
        self.spotify
            .refresh_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("spotify.refresh_token"))
    }

    /// SQLite connection URL for [`Settings::db_location`].
    pub fn db_url(&self) -> String {
        crate::db::db_url(Path::new(&self.db_location))
    }
}

// ============================================================================
// Settings File Operations
// ============================================================================

/// Get the per-user config directory
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spotify-scrobbler"))
}

/// Pick the settings file to read.
///
/// Returns `requested` when it exists or is absolute; otherwise the file of
/// the same name in [`config_dir`] if that one exists.
pub fn resolve_path(requested: &Path) -> PathBuf {
    if requested.exists() || requested.is_absolute() {
        return requested.to_path_buf();
    }

    let fallback = config_dir()
        .zip(requested.file_name())
        .map(|(dir, name)| dir.join(name));

    match fallback {
        Some(path) if path.exists() => {
            tracing::debug!("Using settings from {:?}", path);
            path
        }
        _ => requested.to_path_buf(),
    }
}

/// Parse settings from TOML text and validate them.
pub fn parse(contents: &str, path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings =
        toml::from_str(contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
    settings.validate()?;
    Ok(settings)
}

/// Load and validate settings from disk
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
    let settings = parse(&contents, path)?;

    tracing::info!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Save settings to disk
///
/// Writes to a temp file and renames it over the target.
pub fn save(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::Write(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(settings).map_err(ConfigError::Serialize)?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved settings to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings file {0} not found")]
    NotFound(PathBuf),

    #[error("Failed to read settings from {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse settings file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Missing setting: {0}")]
    Missing(&'static str),

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write settings to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
