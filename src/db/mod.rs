//! Entity store for artists, albums, tracks, genres and scrobbles.
//!
//! Uses SQLx with SQLite for lightweight, embedded database storage.
//! Every operation takes an explicit `&mut SqliteConnection`, so the same
//! calls work on a pooled connection for reads and inside a phase
//! transaction for writes:
//!
//! ```ignore
//! use spotify_scrobbler::db;
//!
//! let pool = db::init_db("sqlite:scrobbles.db").await?;
//! let mut tx = pool.begin().await?;
//! db::insert_artist(&mut tx, &artist).await?;
//! tx.commit().await?; // dropping `tx` instead rolls back
//! ```
//!
//! Inserts follow a first-write-wins policy: a row whose id already exists
//! is left untouched. Scrobbles are unique by timestamp.

use std::collections::BTreeSet;
use std::path::Path;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::QueryBuilder;

use crate::error::StoreError;
use crate::model::{Album, Artist, EntityKind, Genre, Play, Scrobble, Track};

/// Maximum ids bound into a single `IN (...)` list.
///
/// SQLite caps bound parameters per statement (999 on older builds).
const ID_GROUP_SIZE: usize = 500;

pub type StoreResult<T> = Result<T, StoreError>;

/// Build a SQLite database URL from a file path.
pub fn db_url(path: &Path) -> String {
    format!("sqlite:{}", path.display())
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist and applies the embedded
/// schema. SQLx enables `foreign_keys` on every connection, so parent rows
/// must be written before children.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str) -> StoreResult<SqlitePool> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        Sqlite::create_database(db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(sqlx::Error::from)?;

    Ok(pool)
}

// ============================================================================
// Existence queries
// ============================================================================

/// Ids from `ids` that are already stored for `kind`.
///
/// Issues one query per [`ID_GROUP_SIZE`] ids rather than one per id.
pub async fn existing_ids(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    ids: &BTreeSet<String>,
) -> StoreResult<BTreeSet<String>> {
    let ids: Vec<&String> = ids.iter().collect();
    let mut found = BTreeSet::new();

    for group in ids.chunks(ID_GROUP_SIZE) {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT id FROM {} WHERE id IN (", kind.table()));
        let mut list = query.separated(", ");
        for id in group {
            list.push_bind(id.as_str());
        }
        list.push_unseparated(")");

        let rows: Vec<(String,)> = query.build_query_as().fetch_all(&mut *conn).await?;
        found.extend(rows.into_iter().map(|(id,)| id));
    }

    Ok(found)
}

/// Set difference of `ids` against the stored ids of `kind`.
pub async fn missing_ids(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    ids: &BTreeSet<String>,
) -> StoreResult<BTreeSet<String>> {
    let existing = existing_ids(conn, kind, ids).await?;
    Ok(ids.difference(&existing).cloned().collect())
}

/// Whether a row of `kind` with this id is stored.
pub async fn exists(conn: &mut SqliteConnection, kind: EntityKind, id: &str) -> StoreResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", kind.table());
    let row: Option<(i64,)> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

/// The most recent stored play timestamp, the watermark for incremental fetches.
pub async fn latest_scrobble_timestamp(conn: &mut SqliteConnection) -> StoreResult<Option<String>> {
    let latest: Option<String> = sqlx::query_scalar("SELECT MAX(timestamp) FROM scrobbles")
        .fetch_one(&mut *conn)
        .await?;
    Ok(latest)
}

/// Timestamps from `timestamps` that already have a scrobble.
pub async fn existing_timestamps(
    conn: &mut SqliteConnection,
    timestamps: &BTreeSet<String>,
) -> StoreResult<BTreeSet<String>> {
    let timestamps: Vec<&String> = timestamps.iter().collect();
    let mut found = BTreeSet::new();

    for group in timestamps.chunks(ID_GROUP_SIZE) {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT timestamp FROM scrobbles WHERE timestamp IN (");
        let mut list = query.separated(", ");
        for ts in group {
            list.push_bind(ts.as_str());
        }
        list.push_unseparated(")");

        let rows: Vec<(String,)> = query.build_query_as().fetch_all(&mut *conn).await?;
        found.extend(rows.into_iter().map(|(ts,)| ts));
    }

    Ok(found)
}

// ============================================================================
// Inserts
// ============================================================================

/// Insert an artist unless one with the same id exists.
///
/// Genre links are not written here; see [`link_artist_genres`].
///
/// # Returns
///
/// `true` if a new row was created.
pub async fn insert_artist(conn: &mut SqliteConnection, artist: &Artist) -> StoreResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO artists (id, name, popularity, image_url)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&artist.id)
    .bind(&artist.name)
    .bind(artist.popularity)
    .bind(&artist.image_url)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert an album unless one with the same id exists.
///
/// The lead artist must already be stored.
///
/// # Returns
///
/// `true` if a new row was created.
pub async fn insert_album(conn: &mut SqliteConnection, album: &Album) -> StoreResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO albums (
            id, name, lead_artist_id, cover_url, label,
            popularity, release_date, album_type
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&album.id)
    .bind(&album.name)
    .bind(&album.lead_artist_id)
    .bind(&album.cover_url)
    .bind(&album.label)
    .bind(album.popularity)
    .bind(&album.release_date)
    .bind(&album.album_type)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert a track unless one with the same id exists.
///
/// The lead artist and album must already be stored.
///
/// # Returns
///
/// `true` if a new row was created.
pub async fn insert_track(conn: &mut SqliteConnection, track: &Track) -> StoreResult<bool> {
    let f = &track.features;
    let result = sqlx::query(
        r#"
        INSERT INTO tracks (
            id, name, lead_artist_id, album_id, duration_ms, explicit,
            popularity, track_number, acousticness, danceability, energy,
            instrumentalness, "key", liveness, mode, speechiness, tempo,
            valence, time_signature
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&track.id)
    .bind(&track.name)
    .bind(&track.lead_artist_id)
    .bind(&track.album_id)
    .bind(track.duration_ms)
    .bind(track.explicit)
    .bind(track.popularity)
    .bind(track.track_number)
    .bind(f.acousticness)
    .bind(f.danceability)
    .bind(f.energy)
    .bind(f.instrumentalness)
    .bind(f.key)
    .bind(f.liveness)
    .bind(f.mode)
    .bind(f.speechiness)
    .bind(f.tempo)
    .bind(f.valence)
    .bind(f.time_signature)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record a play event.
///
/// # Errors
///
/// [`StoreError::DuplicateScrobble`] if a scrobble with the same timestamp
/// exists. The track must already be stored.
///
/// # Returns
///
/// The surrogate id of the new scrobble.
pub async fn insert_scrobble(conn: &mut SqliteConnection, play: &Play) -> StoreResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO scrobbles (timestamp, track_id, track_name)
        VALUES (?, ?, ?)
        ON CONFLICT(timestamp) DO NOTHING
        "#,
    )
    .bind(&play.timestamp)
    .bind(&play.track_id)
    .bind(&play.track_name)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::DuplicateScrobble(play.timestamp.clone()));
    }
    Ok(result.last_insert_rowid())
}

// ============================================================================
// Genres
// ============================================================================

/// Get or create a genre by exact (case-sensitive) name.
///
/// # Returns
///
/// The genre id and whether it was created by this call.
pub async fn get_or_create_genre(
    conn: &mut SqliteConnection,
    name: &str,
) -> StoreResult<(i64, bool)> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM genres WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some((id,)) = row {
        return Ok((id, false));
    }

    let result = sqlx::query("INSERT INTO genres (name) VALUES (?)")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok((result.last_insert_rowid(), true))
}

/// Associate genres with an artist. Existing links are kept.
pub async fn link_artist_genres(
    conn: &mut SqliteConnection,
    artist_id: &str,
    genre_ids: &[i64],
) -> StoreResult<()> {
    for genre_id in genre_ids {
        sqlx::query("INSERT OR IGNORE INTO artist_genres (artist_id, genre_id) VALUES (?, ?)")
            .bind(artist_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Associate genres with an album. Existing links are kept.
pub async fn link_album_genres(
    conn: &mut SqliteConnection,
    album_id: &str,
    genre_ids: &[i64],
) -> StoreResult<()> {
    for genre_id in genre_ids {
        sqlx::query("INSERT OR IGNORE INTO album_genres (album_id, genre_id) VALUES (?, ?)")
            .bind(album_id)
            .bind(genre_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// All genres, by id.
pub async fn get_genres(conn: &mut SqliteConnection) -> StoreResult<Vec<Genre>> {
    let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;
    Ok(genres)
}

/// Genre names linked to an artist, sorted.
pub async fn artist_genres(
    conn: &mut SqliteConnection,
    artist_id: &str,
) -> StoreResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT g.name FROM genres g
        JOIN artist_genres ag ON ag.genre_id = g.id
        WHERE ag.artist_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(artist_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(names)
}

/// Genre names linked to an album, sorted.
pub async fn album_genres(conn: &mut SqliteConnection, album_id: &str) -> StoreResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT g.name FROM genres g
        JOIN album_genres ag ON ag.genre_id = g.id
        WHERE ag.album_id = ?
        ORDER BY g.name
        "#,
    )
    .bind(album_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(names)
}

// ============================================================================
// Lookups
// ============================================================================

/// Get an artist by id, with its genres.
///
/// Ids are unique, so this returns zero or one artist.
pub async fn get_artist(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<Artist>> {
    let artist: Option<Artist> =
        sqlx::query_as("SELECT id, name, popularity, image_url FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match artist {
        Some(mut artist) => {
            artist.genres = artist_genres(conn, id).await?;
            Ok(Some(artist))
        }
        None => Ok(None),
    }
}

/// Get an album by id, with its genres.
pub async fn get_album(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<Album>> {
    let album: Option<Album> = sqlx::query_as(
        r#"
        SELECT id, name, lead_artist_id, cover_url, label, popularity, release_date, album_type
        FROM albums WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match album {
        Some(mut album) => {
            album.genres = album_genres(conn, id).await?;
            Ok(Some(album))
        }
        None => Ok(None),
    }
}

/// Get a track by id.
pub async fn get_track(conn: &mut SqliteConnection, id: &str) -> StoreResult<Option<Track>> {
    let track = sqlx::query_as::<_, Track>(
        r#"
        SELECT
            id, name, lead_artist_id, album_id, duration_ms, explicit,
            popularity, track_number, acousticness, danceability, energy,
            instrumentalness, "key", liveness, mode, speechiness, tempo,
            valence, time_signature
        FROM tracks WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(track)
}

/// All scrobbles, oldest first.
pub async fn get_scrobbles(conn: &mut SqliteConnection) -> StoreResult<Vec<Scrobble>> {
    let scrobbles = sqlx::query_as::<_, Scrobble>(
        "SELECT id, timestamp, track_id, track_name FROM scrobbles ORDER BY timestamp",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(scrobbles)
}

/// Number of stored rows of `kind`.
pub async fn count(conn: &mut SqliteConnection, kind: EntityKind) -> StoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let n: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
    Ok(n)
}

/// Number of stored genres.
pub async fn count_genres(conn: &mut SqliteConnection) -> StoreResult<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genres")
        .fetch_one(&mut *conn)
        .await?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_album, mock_artist, mock_play, mock_track, temp_db};

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let url = db_url(&db_path);

        let pool = init_db(&url).await.expect("Failed to init db");
        assert!(db_path.exists());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(count(&mut conn, EntityKind::Scrobble).await.unwrap(), 0);
        assert_eq!(count(&mut conn, EntityKind::Track).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_init_db_is_repeatable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let url = db_url(&temp_dir.path().join("test.db"));

        let pool = init_db(&url).await.unwrap();
        pool.close().await;
        init_db(&url).await.expect("Reopening an existing database should succeed");
    }

    #[tokio::test]
    async fn test_insert_artist_first_write_wins() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let original = mock_artist("A1");
        assert!(insert_artist(&mut conn, &original).await.unwrap());

        let renamed = Artist {
            name: "Renamed".to_string(),
            ..mock_artist("A1")
        };
        assert!(!insert_artist(&mut conn, &renamed).await.unwrap());

        let stored = get_artist(&mut conn, "A1").await.unwrap().unwrap();
        assert_eq!(stored.name, original.name);
        assert_eq!(count(&mut conn, EntityKind::Artist).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_is_set_difference() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        insert_artist(&mut conn, &mock_artist("A3")).await.unwrap();

        let missing = missing_ids(&mut conn, EntityKind::Artist, &ids(&["A1", "A2", "A3", "A4"]))
            .await
            .unwrap();
        assert_eq!(missing, ids(&["A2", "A4"]));

        assert!(exists(&mut conn, EntityKind::Artist, "A1").await.unwrap());
        assert!(!exists(&mut conn, EntityKind::Artist, "A2").await.unwrap());
        assert!(!exists(&mut conn, EntityKind::Album, "A1").await.unwrap());
    }

    #[tokio::test]
    async fn test_existing_ids_handles_large_sets() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_artist(&mut conn, &mock_artist("artist-0007")).await.unwrap();
        insert_artist(&mut conn, &mock_artist("artist-1200")).await.unwrap();

        let wanted: BTreeSet<String> = (0..1500).map(|i| format!("artist-{:04}", i)).collect();
        let found = existing_ids(&mut conn, EntityKind::Artist, &wanted).await.unwrap();
        assert_eq!(found, ids(&["artist-0007", "artist-1200"]));

        let empty = existing_ids(&mut conn, EntityKind::Artist, &BTreeSet::new())
            .await
            .unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_track_roundtrip_with_features() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        insert_album(&mut conn, &mock_album("AL1", "A1")).await.unwrap();
        let track = mock_track("T1", "A1", "AL1");
        assert!(insert_track(&mut conn, &track).await.unwrap());

        let stored = get_track(&mut conn, "T1").await.unwrap().unwrap();
        assert_eq!(stored, track);
        assert!(get_track(&mut conn, "T2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let result = insert_album(&mut conn, &mock_album("AL1", "nobody")).await;
        assert!(matches!(result, Err(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn test_duplicate_scrobble_rejected() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        insert_album(&mut conn, &mock_album("AL1", "A1")).await.unwrap();
        insert_track(&mut conn, &mock_track("T1", "A1", "AL1")).await.unwrap();

        let play = mock_play("2024-01-01T00:00:00Z", "T1");
        let id = insert_scrobble(&mut conn, &play).await.unwrap();
        assert!(id > 0);

        let again = insert_scrobble(&mut conn, &play).await;
        assert!(matches!(again, Err(StoreError::DuplicateScrobble(ts)) if ts == play.timestamp));
        assert_eq!(count(&mut conn, EntityKind::Scrobble).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_scrobble_timestamp() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        assert_eq!(latest_scrobble_timestamp(&mut conn).await.unwrap(), None);

        insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        insert_album(&mut conn, &mock_album("AL1", "A1")).await.unwrap();
        insert_track(&mut conn, &mock_track("T1", "A1", "AL1")).await.unwrap();
        for ts in [
            "2024-01-02T10:00:00.000Z",
            "2024-01-03T09:00:00.000Z",
            "2024-01-01T23:59:59.000Z",
        ] {
            insert_scrobble(&mut conn, &mock_play(ts, "T1")).await.unwrap();
        }

        assert_eq!(
            latest_scrobble_timestamp(&mut conn).await.unwrap().as_deref(),
            Some("2024-01-03T09:00:00.000Z")
        );

        let seen = existing_timestamps(
            &mut conn,
            &ids(&["2024-01-02T10:00:00.000Z", "2024-05-05T00:00:00.000Z"]),
        )
        .await
        .unwrap();
        assert_eq!(seen, ids(&["2024-01-02T10:00:00.000Z"]));
    }

    #[tokio::test]
    async fn test_genres_are_case_sensitive_and_reused() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        let (rock, created) = get_or_create_genre(&mut conn, "rock").await.unwrap();
        assert!(created);
        let (again, created) = get_or_create_genre(&mut conn, "rock").await.unwrap();
        assert_eq!(rock, again);
        assert!(!created);
        let (upper, created) = get_or_create_genre(&mut conn, "Rock").await.unwrap();
        assert_ne!(rock, upper);
        assert!(created);

        assert_eq!(count_genres(&mut conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_genre_links() {
        let (pool, _dir) = temp_db().await;
        let mut conn = pool.acquire().await.unwrap();

        insert_artist(&mut conn, &mock_artist("A1")).await.unwrap();
        insert_album(&mut conn, &mock_album("AL1", "A1")).await.unwrap();
        let (shoegaze, _) = get_or_create_genre(&mut conn, "shoegaze").await.unwrap();
        let (dream_pop, _) = get_or_create_genre(&mut conn, "dream pop").await.unwrap();

        link_artist_genres(&mut conn, "A1", &[shoegaze, dream_pop]).await.unwrap();
        link_artist_genres(&mut conn, "A1", &[shoegaze]).await.unwrap();
        link_album_genres(&mut conn, "AL1", &[dream_pop]).await.unwrap();

        let artist = get_artist(&mut conn, "A1").await.unwrap().unwrap();
        assert_eq!(artist.genres, vec!["dream pop", "shoegaze"]);
        let album = get_album(&mut conn, "AL1").await.unwrap().unwrap();
        assert_eq!(album.genres, vec!["dream pop"]);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let (pool, _dir) = temp_db().await;

        {
            let mut tx = pool.begin().await.unwrap();
            insert_artist(&mut tx, &mock_artist("A1")).await.unwrap();
            // dropped without commit
        }

        let mut tx = pool.begin().await.unwrap();
        insert_artist(&mut tx, &mock_artist("A2")).await.unwrap();
        tx.commit().await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(!exists(&mut conn, EntityKind::Artist, "A1").await.unwrap());
        assert!(exists(&mut conn, EntityKind::Artist, "A2").await.unwrap());
    }
}
