//! Adapter layer: Convert Spotify DTOs to domain models
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! Conversions that cannot produce a storable row (no lead artist, no album)
//! return `None`; the caller decides whether that is a skip or an error.

use super::dto;
use crate::model::{Album, Artist, AudioFeatures, Play, Track};

/// Convert a play-history item to a play event.
///
/// Returns `None` for items without a track id (local files, episodes).
pub fn to_play(item: dto::PlayHistoryItem) -> Option<Play> {
    let track = item.track?;
    let track_id = track.id.filter(|id| !id.is_empty())?;

    Some(Play {
        timestamp: item.played_at,
        track_id,
        track_name: track.name,
    })
}

/// Convert an artist object. Absent popularity, images or genres stay empty.
pub fn to_artist(artist: dto::ArtistObject) -> Artist {
    Artist {
        image_url: first_image(artist.images),
        genres: artist.genres.unwrap_or_default(),
        id: artist.id,
        name: artist.name,
        popularity: artist.popularity,
    }
}

/// Convert an album object.
///
/// Returns `None` when the album lists no artist with an id.
pub fn to_album(album: dto::AlbumObject) -> Option<Album> {
    let lead_artist_id = lead_artist_id(&album.artists)?;

    Some(Album {
        lead_artist_id,
        cover_url: first_image(album.images),
        album_type: album.album_type.or(album.object_type),
        genres: album.genres.unwrap_or_default(),
        id: album.id,
        name: album.name,
        label: album.label,
        popularity: album.popularity,
        release_date: album.release_date,
    })
}

/// Convert a track object plus its (optional) audio features.
///
/// Returns `None` when the lead artist or album id is missing.
pub fn to_track(
    track: dto::TrackObject,
    features: Option<dto::AudioFeaturesObject>,
) -> Option<Track> {
    let lead_artist_id = lead_artist_id(&track.artists)?;
    let album_id = track.album.and_then(|a| a.id).filter(|id| !id.is_empty())?;

    Some(Track {
        lead_artist_id,
        album_id,
        features: features.map(to_features).unwrap_or_default(),
        id: track.id,
        name: track.name,
        duration_ms: track.duration_ms,
        explicit: track.explicit,
        popularity: track.popularity,
        track_number: track.track_number,
    })
}

/// Convert an audio features object.
pub fn to_features(f: dto::AudioFeaturesObject) -> AudioFeatures {
    AudioFeatures {
        acousticness: f.acousticness,
        danceability: f.danceability,
        energy: f.energy,
        instrumentalness: f.instrumentalness,
        key: f.key,
        liveness: f.liveness,
        mode: f.mode,
        speechiness: f.speechiness,
        tempo: f.tempo,
        valence: f.valence,
        time_signature: f.time_signature,
    }
}

/// Id of the first listed artist.
pub fn lead_artist_id(artists: &[dto::ArtistRef]) -> Option<String> {
    artists
        .first()
        .and_then(|a| a.id.clone())
        .filter(|id| !id.is_empty())
}

/// URL of the first (widest) image.
fn first_image(images: Option<Vec<dto::Image>>) -> Option<String> {
    images.and_then(|imgs| imgs.into_iter().next()).map(|img| img.url)
}
