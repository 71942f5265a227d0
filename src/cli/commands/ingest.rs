//! The default command: one scrobbling run.

use std::path::Path;

use anyhow::Context;
use tokio::runtime::Runtime;

use super::pluralize;
use crate::config::{self, Settings};
use crate::db;
use crate::ingest::Pipeline;
use crate::spotify::{SpotifyAuth, SpotifyClient};

/// Fetch recent plays and store the new ones
pub fn cmd_ingest(
    rt: &Runtime,
    settings_path: &Path,
    mut settings: Settings,
) -> anyhow::Result<()> {
    let refresh_token = settings.refresh_token()?.to_string();

    rt.block_on(async {
        let auth = SpotifyAuth::new(&settings.spotify)?;
        let token = auth
            .refresh(&refresh_token)
            .await
            .context("Failed to refresh the access token; run `authorize` again")?;

        // Spotify may rotate the refresh token
        if let Some(rotated) = token.refresh_token.filter(|t| *t != refresh_token) {
            settings.spotify.refresh_token = Some(rotated);
            config::save(settings_path, &settings)?;
        }

        let client = SpotifyClient::new(token.access_token)?;
        let pool = db::init_db(&settings.db_url())
            .await
            .with_context(|| format!("Failed to open database {}", settings.db_location))?;

        let report = Pipeline::new(&pool, &client).run().await?;
        pool.close().await;

        if let Some(ref err) = report.aborted {
            eprintln!("Run stopped during {}: {}", report.phase, err);
            eprintln!("Everything stored so far is kept; run again to resume.");
        }
        if report.skipped_plays > 0 {
            eprintln!(
                "Skipped {} {} whose track is unavailable.",
                report.skipped_plays,
                pluralize("play", report.skipped_plays)
            );
        }

        println!(
            "Scrobbled {} {}.",
            report.scrobbles,
            pluralize("track", report.scrobbles)
        );
        Ok(())
    })
}
