//! Application-wide error types.
//!
//! Library modules use specific error types via `thiserror`, while the
//! CLI uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level error enum returned by the pipeline
//! - [`FetchError`]: the provider call failed or returned a malformed shape
//! - [`StoreError`]: database failures plus the expected [`StoreError::DuplicateScrobble`]
//! - [`MissingReference`]: a row skipped because its parent could not be resolved;
//!   it is logged, never returned
//! - [`ConfigError`](crate::config::ConfigError): fatal at startup, reported by the CLI
//!
//! # Example
//!
//! ```ignore
//! use spotify_scrobbler::error::{Result, ResultExt};
//!
//! async fn open(url: &str) -> Result<SqlitePool> {
//!     db::init_db(url).await.with_context("opening the listening history")
//! }
//! ```

use crate::model::EntityKind;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Upstream provider error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Storage error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(StoreError::Database(e))
    }
}

impl Error {
    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Errors talking to the history provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("{failed} of {requested} ids could not be fetched")]
    Incomplete { failed: usize, requested: usize },
}

/// Errors from the entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A scrobble with this timestamp already exists.
    #[error("Scrobble at {0} already recorded")]
    DuplicateScrobble(String),
}

/// A row that was skipped because something it references is not stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} {id} references missing {missing_kind} {missing_id}")]
pub struct MissingReference {
    pub kind: EntityKind,
    pub id: String,
    pub missing_kind: EntityKind,
    pub missing_id: String,
}

impl MissingReference {
    pub fn new(
        kind: EntityKind,
        id: impl Into<String>,
        missing_kind: EntityKind,
        missing_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            missing_kind,
            missing_id: missing_id.into(),
        }
    }

    /// Log the skip. Missing references are never raised.
    pub fn log(&self) {
        tracing::warn!(
            kind = %self.kind,
            id = %self.id,
            missing_kind = %self.missing_kind,
            missing_id = %self.missing_id,
            "Skipping row with unresolved reference"
        );
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, StoreError> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Store(e).context(ctx))
    }
}
