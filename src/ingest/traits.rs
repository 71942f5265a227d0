//! Trait definition for the history provider.
//!
//! The pipeline only talks to the provider through [`HistoryProvider`].
//! Production code uses [`SpotifyClient`](crate::spotify::SpotifyClient),
//! while tests substitute [`mocks::MockProvider`].
//!
//! # Example
//!
//! ```ignore
//! use spotify_scrobbler::ingest::traits::HistoryProvider;
//!
//! // In production code:
//! async fn latest<P: HistoryProvider>(provider: &P) -> Result<(), FetchError> {
//!     let recent = provider.recently_played(None).await?;
//! }
//! ```

use async_trait::async_trait;

use crate::error::FetchError;
use crate::spotify::{Resource, dto};

/// Source of play history and entity metadata.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Most recent plays, newest first, after an optional Unix-ms cursor.
    async fn recently_played(
        &self,
        after_ms: Option<i64>,
    ) -> Result<dto::RecentlyPlayedResponse, FetchError>;

    /// One batched lookup of at most [`Resource::chunk_size`] ids.
    async fn get_entities(
        &self,
        resource: Resource,
        ids: &[String],
    ) -> Result<dto::ChunkResponse, FetchError>;
}

// Implement trait for the real client

#[async_trait]
impl HistoryProvider for crate::spotify::SpotifyClient {
    async fn recently_played(
        &self,
        after_ms: Option<i64>,
    ) -> Result<dto::RecentlyPlayedResponse, FetchError> {
        self.recently_played(after_ms).await
    }

    async fn get_entities(
        &self,
        resource: Resource,
        ids: &[String],
    ) -> Result<dto::ChunkResponse, FetchError> {
        self.get_entities(resource, ids).await
    }
}
