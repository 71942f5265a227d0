//! Core data models for the listening history.
//!
//! Defines the stored entities: [`Artist`], [`Album`], [`Track`],
//! [`Scrobble`] and [`Genre`]. Metadata entities are keyed by the provider's
//! opaque id; scrobbles and genres get surrogate integer ids.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `artists` - Artists with optional popularity and image
//! - `albums` - Albums referencing their lead artist
//! - `tracks` - Tracks referencing lead artist and album, plus audio features
//! - `scrobbles` - Play events, unique by timestamp
//! - `genres` - Genre names, linked through `artist_genres` / `album_genres`

use std::fmt;

use sqlx::FromRow;

/// Kinds of rows held in the store.
///
/// Only artists, albums and tracks are keyed by provider id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Artist,
    Album,
    Track,
    Scrobble,
}

impl EntityKind {
    /// Table holding rows of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Artist => "artists",
            Self::Album => "albums",
            Self::Track => "tracks",
            Self::Scrobble => "scrobbles",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
            Self::Scrobble => "scrobble",
        };
        f.write_str(name)
    }
}

/// An artist, as last described by the provider on first sight.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Artist {
    /// Provider id
    pub id: String,
    pub name: String,
    pub popularity: Option<i64>,
    /// First listed image
    pub image_url: Option<String>,
    /// Genre names (stored via `artist_genres`)
    #[sqlx(skip)]
    pub genres: Vec<String>,
}

/// An album (release) with its lead artist.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Album {
    /// Provider id
    pub id: String,
    pub name: String,
    /// First listed artist; must already be stored
    pub lead_artist_id: String,
    /// First listed image
    pub cover_url: Option<String>,
    pub label: Option<String>,
    pub popularity: Option<i64>,
    /// Release date at the provider's precision (YYYY, YYYY-MM or YYYY-MM-DD)
    pub release_date: Option<String>,
    /// album, single, compilation
    pub album_type: Option<String>,
    /// Genre names (stored via `album_genres`)
    #[sqlx(skip)]
    pub genres: Vec<String>,
}

/// Audio analysis vector for a track. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct AudioFeatures {
    pub acousticness: Option<f64>,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub instrumentalness: Option<f64>,
    /// Pitch class (0 = C)
    pub key: Option<i64>,
    pub liveness: Option<f64>,
    /// 1 = major, 0 = minor
    pub mode: Option<i64>,
    pub speechiness: Option<f64>,
    /// Beats per minute
    pub tempo: Option<f64>,
    pub valence: Option<f64>,
    pub time_signature: Option<i64>,
}

/// A track with its references and audio features.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Track {
    /// Provider id
    pub id: String,
    pub name: String,
    /// First listed artist; must already be stored
    pub lead_artist_id: String,
    /// Must already be stored
    pub album_id: String,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub popularity: Option<i64>,
    pub track_number: Option<i64>,
    #[sqlx(flatten)]
    pub features: AudioFeatures,
}

/// A play event reported by the provider, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Play {
    /// Provider ISO-8601 timestamp; the dedup key
    pub timestamp: String,
    pub track_id: String,
    /// Track name at the time of the play
    pub track_name: Option<String>,
}

/// A stored play event.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Scrobble {
    /// Database ID (auto-generated)
    pub id: i64,
    pub timestamp: String,
    pub track_id: String,
    pub track_name: Option<String>,
}

/// A genre name with its surrogate id.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Genre {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Unique, case-sensitive
    pub name: String,
}
