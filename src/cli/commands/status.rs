//! Store summary command.

use anyhow::Context;
use tokio::runtime::Runtime;

use crate::config::Settings;
use crate::db;
use crate::model::EntityKind;

/// Show stored row counts and the watermark
pub fn cmd_status(rt: &Runtime, settings: &Settings) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&settings.db_url())
            .await
            .with_context(|| format!("Failed to open database {}", settings.db_location))?;
        let mut conn = pool.acquire().await?;

        let scrobbles = db::count(&mut conn, EntityKind::Scrobble).await?;
        let tracks = db::count(&mut conn, EntityKind::Track).await?;
        let albums = db::count(&mut conn, EntityKind::Album).await?;
        let artists = db::count(&mut conn, EntityKind::Artist).await?;
        let genres = db::count_genres(&mut conn).await?;
        let latest = db::latest_scrobble_timestamp(&mut conn).await?;

        println!("Listening History");
        println!("=================");
        println!("Database:   {}", settings.db_location);
        println!("Scrobbles:  {}", scrobbles);
        println!("Tracks:     {}", tracks);
        println!("Albums:     {}", albums);
        println!("Artists:    {}", artists);
        println!("Genres:     {}", genres);
        println!("Last play:  {}", latest.as_deref().unwrap_or("never"));
        if settings.spotify.refresh_token.is_none() {
            println!();
            println!("Not authorized yet. Run `spotify-scrobbler auth-url` to start.");
        }
        Ok(())
    })
}
