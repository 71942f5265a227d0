//! Spotify Web API Data Transfer Objects
//!
//! These types match what the Spotify Web API returns, trimmed to the fields
//! we store. Every field the API may omit or null out is an `Option`, so
//! schema drift degrades to missing values instead of parse failures.
//! Convert to domain types in `adapter.rs`; nothing outside `spotify` and
//! the batch fetcher should need these.
//!
//! API Reference: https://developer.spotify.com/documentation/web-api

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `GET /me/player/recently-played`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecentlyPlayedResponse {
    /// Play history, newest first
    #[serde(default)]
    pub items: Vec<PlayHistoryItem>,
    pub cursors: Option<Cursors>,
    pub next: Option<String>,
}

/// Cursor pair for the recently-played endpoint (Unix ms as strings)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cursors {
    pub after: Option<String>,
    pub before: Option<String>,
}

/// One play event
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayHistoryItem {
    /// ISO-8601 timestamp, e.g. "2024-01-01T00:00:00.000Z"
    pub played_at: String,
    /// Null for some non-track items
    pub track: Option<PlayedTrack>,
}

/// The track embedded in a play event. Only id and name are relied on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayedTrack {
    /// Null for local files
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Simplified artist embedded in track and album objects
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Simplified album embedded in a track object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumRef {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

/// Image with optional dimensions; lists are ordered widest first
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

/// Full track object (`GET /tracks?ids=`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub album: Option<AlbumRef>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub popularity: Option<i64>,
    pub track_number: Option<i64>,
}

/// Full artist object (`GET /artists?ids=`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtistObject {
    pub id: String,
    pub name: String,
    pub popularity: Option<i64>,
    pub images: Option<Vec<Image>>,
    pub genres: Option<Vec<String>>,
}

/// Full album object (`GET /albums?ids=`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlbumObject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    pub images: Option<Vec<Image>>,
    pub label: Option<String>,
    pub popularity: Option<i64>,
    pub release_date: Option<String>,
    /// album, single, compilation
    pub album_type: Option<String>,
    /// Object type; always "album"
    #[serde(rename = "type")]
    pub object_type: Option<String>,
    pub genres: Option<Vec<String>>,
}

/// Audio features object (`GET /audio-features?ids=`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioFeaturesObject {
    pub id: String,
    pub acousticness: Option<f64>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub key: Option<i64>,
    pub liveness: Option<f64>,
    pub mode: Option<i64>,
    pub speechiness: Option<f64>,
    pub tempo: Option<f64>,
    pub valence: Option<f64>,
    pub time_signature: Option<i64>,
}

/// One batched lookup response before flattening.
///
/// Spotify wraps batch results in a single-key object
/// (`{"tracks": [...]}`, `{"audio_features": [...]}`); a bare list is
/// accepted too. Entries are `null` for ids the API cannot resolve.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChunkResponse {
    Bare(Vec<serde_json::Value>),
    Keyed(BTreeMap<String, serde_json::Value>),
}

/// Token endpoint response (`POST https://accounts.spotify.com/api/token`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    /// Present on code exchange; sometimes rotated on refresh
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Regular Web API error body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub status: u16,
    pub message: String,
}

/// Accounts-service (OAuth) error body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthError {
    pub error: String,
    pub error_description: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// If these fail, the API has changed and we need to update our DTOs.
// ============================================================================
