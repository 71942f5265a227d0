//! Dependency resolver: what is new, and what is missing.
//!
//! Every function here is a local read against the store; none of them
//! call the provider. Missing sets are always derived fresh from store
//! state, which is what lets an aborted run resume.

use std::collections::{BTreeSet, HashSet};

use sqlx::SqliteConnection;

use crate::db::{self, StoreResult};
use crate::model::{Album, EntityKind, Play, Track};

/// Plays not yet stored, oldest first.
///
/// Drops candidates whose timestamp already has a scrobble (one
/// set-membership query) and repeats of a timestamp within the batch.
pub async fn new_plays(
    conn: &mut SqliteConnection,
    candidates: Vec<Play>,
) -> StoreResult<Vec<Play>> {
    let timestamps: BTreeSet<String> = candidates.iter().map(|p| p.timestamp.clone()).collect();
    let stored = db::existing_timestamps(conn, &timestamps).await?;

    let mut seen = HashSet::new();
    let mut plays: Vec<Play> = candidates
        .into_iter()
        .filter(|p| !stored.contains(&p.timestamp))
        .filter(|p| seen.insert(p.timestamp.clone()))
        .collect();

    plays.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(plays)
}

/// Track ids referenced by `plays` that are not stored.
pub async fn missing_tracks(
    conn: &mut SqliteConnection,
    plays: &[Play],
) -> StoreResult<BTreeSet<String>> {
    let referenced: BTreeSet<String> = plays.iter().map(|p| p.track_id.clone()).collect();
    db::missing_ids(conn, EntityKind::Track, &referenced).await
}

/// Lead artists of `tracks` that are not stored.
pub async fn missing_artists(
    conn: &mut SqliteConnection,
    tracks: &[Track],
) -> StoreResult<BTreeSet<String>> {
    let referenced: BTreeSet<String> = tracks.iter().map(|t| t.lead_artist_id.clone()).collect();
    db::missing_ids(conn, EntityKind::Artist, &referenced).await
}

/// Albums of `tracks` that are not stored.
pub async fn missing_albums(
    conn: &mut SqliteConnection,
    tracks: &[Track],
) -> StoreResult<BTreeSet<String>> {
    let referenced: BTreeSet<String> = tracks.iter().map(|t| t.album_id.clone()).collect();
    db::missing_ids(conn, EntityKind::Album, &referenced).await
}

/// Lead artists of `albums` that are not stored.
///
/// A compilation's lead artist is often none of its tracks' lead artists.
pub async fn missing_album_artists(
    conn: &mut SqliteConnection,
    albums: &[Album],
) -> StoreResult<BTreeSet<String>> {
    let referenced: BTreeSet<String> = albums.iter().map(|a| a.lead_artist_id.clone()).collect();
    db::missing_ids(conn, EntityKind::Artist, &referenced).await
}

/// Map genre names to genre ids, creating unseen names.
///
/// Matching is exact and case-sensitive. Repeated names resolve once.
///
/// # Returns
///
/// The ids in first-seen order and how many genres were created.
pub async fn resolve_genres(
    conn: &mut SqliteConnection,
    names: &[String],
) -> StoreResult<(Vec<i64>, usize)> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    let mut created = 0;

    for name in names {
        if name.is_empty() || !seen.insert(name.as_str()) {
            continue;
        }
        let (id, new) = db::get_or_create_genre(conn, name).await?;
        if new {
            created += 1;
        }
        ids.push(id);
    }

    Ok((ids, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_album, mock_artist, mock_play, mock_track, temp_db};

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_new_plays_dedups_and_sorts() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        db::insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        db::insert_album(&mut conn, &mock_album("AL1", "A1")).await.unwrap();
        db::insert_track(&mut conn, &mock_track("T1", "A1", "AL1")).await.unwrap();
        db::insert_scrobble(&mut conn, &mock_play("2024-01-01T00:00:00Z", "T1"))
            .await
            .unwrap();

        let candidates = vec![
            mock_play("2024-01-03T00:00:00Z", "T3"),
            mock_play("2024-01-02T00:00:00Z", "T2"),
            mock_play("2024-01-02T00:00:00Z", "T2"),
            mock_play("2024-01-01T00:00:00Z", "T1"),
        ];
        let plays = new_plays(&mut conn, candidates).await.unwrap();

        let timestamps: Vec<&str> = plays.iter().map(|p| p.timestamp.as_str()).collect();
        assert_eq!(timestamps, vec!["2024-01-02T00:00:00Z", "2024-01-03T00:00:00Z"]);
    }

    #[tokio::test]
    async fn test_missing_sets_follow_track_records() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        db::insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        db::insert_album(&mut conn, &mock_album("AL1", "A1")).await.unwrap();
        db::insert_track(&mut conn, &mock_track("T1", "A1", "AL1")).await.unwrap();

        let plays = vec![
            mock_play("2024-01-01T00:00:00Z", "T1"),
            mock_play("2024-01-02T00:00:00Z", "T2"),
        ];
        assert_eq!(missing_tracks(&mut conn, &plays).await.unwrap(), set(&["T2"]));

        let tracks = vec![
            mock_track("T2", "A1", "AL2"),
            mock_track("T3", "A2", "AL1"),
        ];
        assert_eq!(missing_artists(&mut conn, &tracks).await.unwrap(), set(&["A2"]));
        assert_eq!(missing_albums(&mut conn, &tracks).await.unwrap(), set(&["AL2"]));

        let albums = vec![mock_album("AL2", "A9"), mock_album("AL3", "A1")];
        assert_eq!(
            missing_album_artists(&mut conn, &albums).await.unwrap(),
            set(&["A9"])
        );
    }

    #[tokio::test]
    async fn test_resolve_genres_is_case_sensitive() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let names: Vec<String> = ["rock", "Rock", "rock"].iter().map(|s| s.to_string()).collect();
        let (ids, created) = resolve_genres(&mut conn, &names).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(created, 2);

        let (again, created) = resolve_genres(&mut conn, &names[..1]).await.unwrap();
        assert_eq!(again, vec![ids[0]]);
        assert_eq!(created, 0);
        assert_eq!(db::count_genres(&mut conn).await.unwrap(), 2);
    }
}
