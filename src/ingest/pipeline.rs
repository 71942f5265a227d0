//! Ingestion pipeline.
//!
//! One run moves through the phases of [`Phase`] in order. Each phase that
//! writes does so in its own transaction, so an aborted run keeps everything
//! committed before the failure and a rerun picks up from store state:
//!
//! ```text
//! FetchPlays → ResolveTracks → FetchTracks → ResolveArtists → FetchArtists
//!     → ResolveAlbums → FetchAlbums → InsertTracks → InsertScrobbles → Done
//! ```
//!
//! Rows whose parent is still missing after its fetch are skipped and logged
//! as [`MissingReference`], never raised.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use sqlx::{SqliteConnection, SqlitePool};

use super::fetcher::BatchFetcher;
use super::resolver;
use super::traits::HistoryProvider;
use crate::db;
use crate::error::{Error, MissingReference, Result, ResultExt, StoreError};
use crate::model::{Album, Artist, EntityKind, Play, Track};
use crate::spotify::{Resource, adapter, dto};

/// Pipeline phases, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Phase {
    #[default]
    FetchPlays,
    ResolveTracks,
    FetchTracks,
    ResolveArtists,
    /// Writes artists and their genres
    FetchArtists,
    ResolveAlbums,
    /// Writes albums, their genres and any missing album artists
    FetchAlbums,
    InsertTracks,
    InsertScrobbles,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::FetchPlays => "fetch plays",
            Phase::ResolveTracks => "resolve tracks",
            Phase::FetchTracks => "fetch tracks",
            Phase::ResolveArtists => "resolve artists",
            Phase::FetchArtists => "fetch artists",
            Phase::ResolveAlbums => "resolve albums",
            Phase::FetchAlbums => "fetch albums",
            Phase::InsertTracks => "insert tracks",
            Phase::InsertScrobbles => "insert scrobbles",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcome of one ingestion run.
///
/// Counts are rows actually created by this run. Skip counts are applied
/// together with the write phase the skipped rows belonged to.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Plays returned by the provider
    pub plays_fetched: usize,
    /// Plays not already stored
    pub new_plays: usize,
    pub scrobbles: usize,
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    pub genres: usize,
    /// New plays not recorded because their track is unavailable
    pub skipped_plays: usize,
    /// Artists, albums or tracks skipped for a missing reference
    pub skipped_rows: usize,
    /// Last phase entered
    pub phase: Phase,
    /// Why the run stopped early, if it did
    pub aborted: Option<Error>,
}

impl RunReport {
    /// Whether this run made anything durable.
    pub fn committed(&self) -> bool {
        self.scrobbles + self.artists + self.albums + self.tracks + self.genres > 0
    }

    /// Whether the run reached the end (or had nothing to do).
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    /// Add the counts of a committed write phase.
    fn absorb(&mut self, written: RunReport) {
        self.scrobbles += written.scrobbles;
        self.artists += written.artists;
        self.albums += written.albums;
        self.tracks += written.tracks;
        self.genres += written.genres;
        self.skipped_plays += written.skipped_plays;
        self.skipped_rows += written.skipped_rows;
    }
}

/// Orchestrates resolver, fetcher and store for one run.
pub struct Pipeline<'a, P: ?Sized> {
    pool: &'a SqlitePool,
    fetcher: BatchFetcher<'a, P>,
}

impl<'a, P: HistoryProvider + ?Sized> Pipeline<'a, P> {
    pub fn new(pool: &'a SqlitePool, provider: &'a P) -> Self {
        Self {
            pool,
            fetcher: BatchFetcher::new(provider),
        }
    }

    /// Run one ingestion pass.
    ///
    /// # Errors
    ///
    /// Only when a phase fails before anything was committed. A failure
    /// after a commit is reported through [`RunReport::aborted`].
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        match self.execute(&mut report).await {
            Ok(()) => Ok(report),
            Err(e) => {
                tracing::error!(phase = %report.phase, error = %e, "Ingestion aborted");
                if report.committed() {
                    report.aborted = Some(e);
                    Ok(report)
                } else {
                    Err(e.context(format!("ingestion failed during {}", report.phase)))
                }
            }
        }
    }

    async fn execute(&self, report: &mut RunReport) -> Result<()> {
        // FETCH_PLAYS
        report.phase = Phase::FetchPlays;
        let watermark = {
            let mut conn = self.pool.acquire().await?;
            db::latest_scrobble_timestamp(&mut conn)
                .await
                .with_context("reading the watermark")?
        };
        let candidates = self.fetcher.fetch_recent_plays(watermark.as_deref()).await?;
        report.plays_fetched = candidates.len();

        let plays = {
            let mut conn = self.pool.acquire().await?;
            resolver::new_plays(&mut conn, candidates)
                .await
                .with_context("filtering stored plays")?
        };
        report.new_plays = plays.len();
        tracing::info!(
            fetched = report.plays_fetched,
            new = report.new_plays,
            watermark = watermark.as_deref().unwrap_or("none"),
            "Fetched recent plays"
        );
        if plays.is_empty() {
            return Ok(());
        }

        // RESOLVE_TRACKS / FETCH_TRACKS
        report.phase = Phase::ResolveTracks;
        let missing = {
            let mut conn = self.pool.acquire().await?;
            resolver::missing_tracks(&mut conn, &plays).await?
        };

        report.phase = Phase::FetchTracks;
        let mut track_phase = RunReport::default();
        let tracks = self.fetch_tracks(&missing, &mut track_phase).await?;
        tracing::info!(missing = missing.len(), fetched = tracks.len(), "Fetched tracks");

        // RESOLVE_ARTISTS / FETCH_ARTISTS
        report.phase = Phase::ResolveArtists;
        let missing = {
            let mut conn = self.pool.acquire().await?;
            resolver::missing_artists(&mut conn, &tracks).await?
        };

        report.phase = Phase::FetchArtists;
        let artists = self.fetch_artists(&missing).await?;
        if !artists.is_empty() {
            let mut written = RunReport::default();
            let mut tx = self.pool.begin().await?;
            self.store_artists(&mut tx, &artists, &mut written).await?;
            tx.commit().await?;
            report.absorb(written);
        }
        tracing::info!(missing = missing.len(), stored = report.artists, "Stored artists");

        // RESOLVE_ALBUMS / FETCH_ALBUMS
        report.phase = Phase::ResolveAlbums;
        let missing = {
            let mut conn = self.pool.acquire().await?;
            resolver::missing_albums(&mut conn, &tracks).await?
        };

        report.phase = Phase::FetchAlbums;
        let mut written = RunReport::default();
        let albums = self.fetch_albums(&missing, &mut written).await?;
        let missing_leads = {
            let mut conn = self.pool.acquire().await?;
            resolver::missing_album_artists(&mut conn, &albums).await?
        };
        let lead_artists = self.fetch_artists(&missing_leads).await?;
        if !albums.is_empty() || !lead_artists.is_empty() {
            let mut tx = self.pool.begin().await?;
            self.store_artists(&mut tx, &lead_artists, &mut written).await?;
            self.store_albums(&mut tx, &albums, &mut written).await?;
            tx.commit().await?;
        }
        report.absorb(written);
        tracing::info!(missing = missing.len(), stored = report.albums, "Stored albums");

        // INSERT_TRACKS
        report.phase = Phase::InsertTracks;
        if !tracks.is_empty() {
            let mut tx = self.pool.begin().await?;
            self.store_tracks(&mut tx, &tracks, &mut track_phase).await?;
            tx.commit().await?;
        }
        report.absorb(track_phase);
        tracing::info!(stored = report.tracks, "Stored tracks");

        // INSERT_SCROBBLES
        report.phase = Phase::InsertScrobbles;
        let mut written = RunReport::default();
        let mut tx = self.pool.begin().await?;
        self.store_scrobbles(&mut tx, &plays, &mut written).await?;
        tx.commit().await?;
        report.absorb(written);
        tracing::info!(
            stored = report.scrobbles,
            skipped = report.skipped_plays,
            "Stored scrobbles"
        );

        report.phase = Phase::Done;
        Ok(())
    }

    // ========================================================================
    // Fetch phases
    // ========================================================================

    /// Fetch missing tracks with their audio features.
    ///
    /// Tracks the provider cannot resolve are dropped. Audio features are
    /// best-effort: a failed feature chunk leaves those tracks without them.
    async fn fetch_tracks(
        &self,
        ids: &BTreeSet<String>,
        report: &mut RunReport,
    ) -> Result<Vec<Track>> {
        let ids: Vec<String> = ids.iter().cloned().collect();
        let objects: Vec<dto::TrackObject> = self
            .fetcher
            .fetch_entities(Resource::Tracks, &ids)
            .await
            .complete()?
            .into_iter()
            .flatten()
            .collect();

        if objects.len() < ids.len() {
            tracing::warn!(
                unavailable = ids.len() - objects.len(),
                "Provider returned no record for some tracks"
            );
        }

        let found: Vec<String> = objects.iter().map(|t| t.id.clone()).collect();
        let features = self
            .fetcher
            .fetch_entities::<dto::AudioFeaturesObject>(Resource::AudioFeatures, &found)
            .await;
        if !features.is_complete() {
            tracing::warn!(
                tracks = features.failed.len(),
                "Audio features unavailable, storing tracks without them"
            );
        }
        let mut features: HashMap<String, dto::AudioFeaturesObject> = features
            .records
            .into_iter()
            .flatten()
            .map(|f| (f.id.clone(), f))
            .collect();

        let mut tracks = Vec::with_capacity(objects.len());
        for object in objects {
            let id = object.id.clone();
            let track_features = features.remove(&id);
            match adapter::to_track(object, track_features) {
                Some(track) => tracks.push(track),
                None => {
                    report.skipped_rows += 1;
                    tracing::warn!(track = %id, "Skipping track without lead artist or album");
                }
            }
        }
        Ok(tracks)
    }

    /// Fetch artists by id. Ids the provider cannot resolve are dropped.
    async fn fetch_artists(&self, ids: &BTreeSet<String>) -> Result<Vec<Artist>> {
        let ids: Vec<String> = ids.iter().cloned().collect();
        let artists = self
            .fetcher
            .fetch_entities::<dto::ArtistObject>(Resource::Artists, &ids)
            .await
            .complete()?
            .into_iter()
            .flatten()
            .map(adapter::to_artist)
            .collect();
        Ok(artists)
    }

    /// Fetch albums by id. Ids the provider cannot resolve are dropped.
    async fn fetch_albums(
        &self,
        ids: &BTreeSet<String>,
        report: &mut RunReport,
    ) -> Result<Vec<Album>> {
        let ids: Vec<String> = ids.iter().cloned().collect();
        let objects = self
            .fetcher
            .fetch_entities::<dto::AlbumObject>(Resource::Albums, &ids)
            .await
            .complete()?;

        let mut albums = Vec::with_capacity(objects.len());
        for object in objects.into_iter().flatten() {
            let id = object.id.clone();
            match adapter::to_album(object) {
                Some(album) => albums.push(album),
                None => {
                    report.skipped_rows += 1;
                    tracing::warn!(album = %id, "Skipping album without lead artist");
                }
            }
        }
        Ok(albums)
    }

    // ========================================================================
    // Write phases
    // ========================================================================

    async fn store_artists(
        &self,
        conn: &mut SqliteConnection,
        artists: &[Artist],
        report: &mut RunReport,
    ) -> Result<()> {
        for artist in artists {
            let (genre_ids, created) = resolver::resolve_genres(conn, &artist.genres).await?;
            report.genres += created;
            if db::insert_artist(conn, artist).await? {
                report.artists += 1;
            }
            db::link_artist_genres(conn, &artist.id, &genre_ids).await?;
        }
        Ok(())
    }

    async fn store_albums(
        &self,
        conn: &mut SqliteConnection,
        albums: &[Album],
        report: &mut RunReport,
    ) -> Result<()> {
        for album in albums {
            if !db::exists(conn, EntityKind::Artist, &album.lead_artist_id).await? {
                let missing = MissingReference::new(
                    EntityKind::Album,
                    &album.id,
                    EntityKind::Artist,
                    &album.lead_artist_id,
                );
                skip(report, missing);
                continue;
            }

            let (genre_ids, created) = resolver::resolve_genres(conn, &album.genres).await?;
            report.genres += created;
            if db::insert_album(conn, album).await? {
                report.albums += 1;
            }
            db::link_album_genres(conn, &album.id, &genre_ids).await?;
        }
        Ok(())
    }

    async fn store_tracks(
        &self,
        conn: &mut SqliteConnection,
        tracks: &[Track],
        report: &mut RunReport,
    ) -> Result<()> {
        for track in tracks {
            if !db::exists(conn, EntityKind::Artist, &track.lead_artist_id).await? {
                let missing = MissingReference::new(
                    EntityKind::Track,
                    &track.id,
                    EntityKind::Artist,
                    &track.lead_artist_id,
                );
                skip(report, missing);
                continue;
            }
            if !db::exists(conn, EntityKind::Album, &track.album_id).await? {
                let missing = MissingReference::new(
                    EntityKind::Track,
                    &track.id,
                    EntityKind::Album,
                    &track.album_id,
                );
                skip(report, missing);
                continue;
            }

            if db::insert_track(conn, track).await? {
                report.tracks += 1;
            }
        }
        Ok(())
    }

    async fn store_scrobbles(
        &self,
        conn: &mut SqliteConnection,
        plays: &[Play],
        report: &mut RunReport,
    ) -> Result<()> {
        for play in plays {
            if !db::exists(conn, EntityKind::Track, &play.track_id).await? {
                MissingReference::new(
                    EntityKind::Scrobble,
                    &play.timestamp,
                    EntityKind::Track,
                    &play.track_id,
                )
                .log();
                report.skipped_plays += 1;
                continue;
            }

            match db::insert_scrobble(conn, play).await {
                Ok(_) => report.scrobbles += 1,
                Err(StoreError::DuplicateScrobble(ts)) => {
                    tracing::debug!(timestamp = %ts, "Scrobble already recorded");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn skip(report: &mut RunReport, missing: MissingReference) {
    missing.log();
    report.skipped_rows += 1;
}
