//! Test utilities and fixtures for spotify-scrobbler tests.
//!
//! This module provides common test helpers, mock factories, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use spotify_scrobbler::test_utils::{temp_db, mock_artist};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let artist = mock_artist("A1");
//!     // ... test logic
//! }
//! ```

use serde_json::{Value, json};
use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::model::{Album, Artist, AudioFeatures, Play, Track};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// # Returns
///
/// A tuple of (connection pool, temp directory handle).
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = crate::db::db_url(&dir.path().join("test.db"));

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

// ============================================================================
// Domain fixtures
// ============================================================================

/// Creates a mock Artist with sensible defaults and no genres.
///
/// Customize using struct update syntax:
///
/// ```ignore
/// let artist = Artist {
///     genres: vec!["shoegaze".to_string()],
///     ..mock_artist("A1")
/// };
/// ```
pub fn mock_artist(id: &str) -> Artist {
    Artist {
        id: id.to_string(),
        name: format!("Artist {}", id),
        popularity: Some(42),
        image_url: Some(format!("https://i.scdn.co/image/{}", id)),
        genres: vec![],
    }
}

/// Creates a mock Album led by `artist_id`.
pub fn mock_album(id: &str, artist_id: &str) -> Album {
    Album {
        id: id.to_string(),
        name: format!("Album {}", id),
        lead_artist_id: artist_id.to_string(),
        cover_url: Some(format!("https://i.scdn.co/image/{}", id)),
        label: Some("Test Label".to_string()),
        popularity: Some(30),
        release_date: Some("2020-02-02".to_string()),
        album_type: Some("album".to_string()),
        genres: vec![],
    }
}

/// Creates a mock Track with a full feature vector.
///
/// Feature values are exactly representable so they survive a round trip
/// through SQLite unchanged.
pub fn mock_track(id: &str, artist_id: &str, album_id: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {}", id),
        lead_artist_id: artist_id.to_string(),
        album_id: album_id.to_string(),
        duration_ms: Some(180_000),
        explicit: Some(false),
        popularity: Some(55),
        track_number: Some(1),
        features: AudioFeatures {
            acousticness: Some(0.25),
            danceability: Some(0.5),
            energy: Some(0.75),
            instrumentalness: Some(0.0),
            key: Some(7),
            liveness: Some(0.125),
            mode: Some(1),
            speechiness: Some(0.0625),
            tempo: Some(120.0),
            valence: Some(0.5),
            time_signature: Some(4),
        },
    }
}

/// Creates a play event for `track_id` at `timestamp`.
pub fn mock_play(timestamp: &str, track_id: &str) -> Play {
    Play {
        timestamp: timestamp.to_string(),
        track_id: track_id.to_string(),
        track_name: Some(format!("Track {}", track_id)),
    }
}

// ============================================================================
// Provider JSON fixtures
// ============================================================================

/// Full track object as the tracks endpoint returns it.
pub fn track_json(id: &str, artist_id: &str, album_id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Track {}", id),
        "artists": [{"id": artist_id, "name": format!("Artist {}", artist_id)}],
        "album": {
            "id": album_id,
            "name": format!("Album {}", album_id),
            "artists": [{"id": artist_id}]
        },
        "duration_ms": 180000,
        "explicit": false,
        "popularity": 55,
        "track_number": 1
    })
}

/// Full artist object with the given genres.
pub fn artist_json(id: &str, genres: &[&str]) -> Value {
    json!({
        "id": id,
        "name": format!("Artist {}", id),
        "popularity": 42,
        "images": [{"url": format!("https://i.scdn.co/image/{}", id), "height": 640, "width": 640}],
        "genres": genres
    })
}

/// Full album object led by `artist_id` with the given genres.
pub fn album_json(id: &str, artist_id: &str, genres: &[&str]) -> Value {
    json!({
        "id": id,
        "name": format!("Album {}", id),
        "album_type": "album",
        "type": "album",
        "artists": [{"id": artist_id, "name": format!("Artist {}", artist_id)}],
        "images": [{"url": format!("https://i.scdn.co/image/{}", id), "height": 640, "width": 640}],
        "label": "Test Label",
        "popularity": 30,
        "release_date": "2020-02-02",
        "genres": genres
    })
}

/// Audio features object for a track.
pub fn features_json(track_id: &str) -> Value {
    json!({
        "id": track_id,
        "acousticness": 0.25,
        "danceability": 0.5,
        "energy": 0.75,
        "instrumentalness": 0.0,
        "key": 7,
        "liveness": 0.125,
        "mode": 1,
        "speechiness": 0.0625,
        "tempo": 120.0,
        "valence": 0.5,
        "time_signature": 4
    })
}
