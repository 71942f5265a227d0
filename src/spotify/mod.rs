//! Spotify Web API integration.
//!
//! - [`client`]: bearer-authenticated Web API calls
//! - [`auth`]: accounts-service authorization-code and refresh flows
//! - [`dto`]: wire shapes
//! - [`adapter`]: DTO → domain model conversion

pub mod adapter;
pub mod auth;
pub mod client;
pub mod dto;

pub use auth::SpotifyAuth;
pub use client::SpotifyClient;

use chrono::DateTime;

/// A batch lookup endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Tracks,
    Artists,
    Albums,
    AudioFeatures,
}

impl Resource {
    /// Largest number of ids the endpoint accepts per request.
    pub fn chunk_size(self) -> usize {
        match self {
            Resource::Tracks | Resource::Artists => 50,
            Resource::Albums => 20,
            Resource::AudioFeatures => 100,
        }
    }

    /// Path under the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Tracks => "tracks",
            Resource::Artists => "artists",
            Resource::Albums => "albums",
            Resource::AudioFeatures => "audio-features",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Convert a stored `played_at` timestamp to the Unix-millisecond cursor
/// accepted by the recently-played `after` parameter.
///
/// Returns `None` if the timestamp is not RFC 3339.
pub fn timestamp_to_cursor(timestamp: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
