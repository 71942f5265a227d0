//! One-time authorization commands.

use std::path::Path;

use anyhow::Context;
use tokio::runtime::Runtime;

use crate::config::{self, Settings};
use crate::spotify::SpotifyAuth;

/// Print the authorization URL
pub fn cmd_auth_url(settings: &Settings) -> anyhow::Result<()> {
    let auth = SpotifyAuth::new(&settings.spotify)?;

    println!("Open this URL, approve access, and copy the `code` parameter");
    println!("from the page you are redirected to:");
    println!();
    println!("{}", auth.authorize_url());
    println!();
    println!("Then run: spotify-scrobbler authorize <CODE>");
    Ok(())
}

/// Exchange an authorization code and store the refresh token
pub fn cmd_authorize(
    rt: &Runtime,
    settings_path: &Path,
    mut settings: Settings,
    code: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let auth = SpotifyAuth::new(&settings.spotify)?;
        let token = auth
            .exchange_code(code.trim())
            .await
            .context("Authorization failed")?;

        settings.spotify.refresh_token = token.refresh_token;
        config::save(settings_path, &settings)?;

        println!("Authorized. Refresh token saved to {}", settings_path.display());
        Ok(())
    })
}
