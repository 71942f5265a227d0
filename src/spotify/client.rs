//! Spotify Web API client
//!
//! Handles the play-history and batch lookup endpoints.
//! See: https://developer.spotify.com/documentation/web-api
//!
//! IMPORTANT: Spotify answers bursts with 429 and a Retry-After header;
//! those requests are retried a bounded number of times.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;

use super::{Resource, dto};
use crate::error::FetchError;

/// Web API base URL
const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Maximum plays per recently-played request
pub const RECENTLY_PLAYED_LIMIT: u32 = 50;

/// Attempts per request when rate limited
const MAX_ATTEMPTS: u32 = 3;

/// Wait used when a 429 carries no usable Retry-After
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// User agent string
const USER_AGENT: &str = concat!("spotify-scrobbler/", env!("CARGO_PKG_VERSION"));

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl SpotifyClient {
    /// Create a client for an already-obtained access token
    pub fn new(access_token: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(access_token, API_BASE_URL)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            access_token: access_token.into(),
            base_url: base_url.into(),
        })
    }

    /// The user's most recent plays, optionally only those after a Unix-ms cursor.
    pub async fn recently_played(
        &self,
        after_ms: Option<i64>,
    ) -> Result<dto::RecentlyPlayedResponse, FetchError> {
        let mut query = vec![("limit", RECENTLY_PLAYED_LIMIT.to_string())];
        if let Some(after) = after_ms {
            query.push(("after", after.to_string()));
        }

        let url = format!("{}/me/player/recently-played", self.base_url);
        self.get_json(&url, &query).await
    }

    /// One batched lookup. `ids` must not exceed [`Resource::chunk_size`].
    pub async fn get_entities(
        &self,
        resource: Resource,
        ids: &[String],
    ) -> Result<dto::ChunkResponse, FetchError> {
        let url = format!("{}/{}", self.base_url, resource.path());
        self.get_json(&url, &[("ids", ids.join(","))]).await
    }

    /// Send a GET request, retrying on 429, and parse the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut attempt = 1;

        loop {
            let response = self
                .http_client
                .get(url)
                .bearer_auth(&self.access_token)
                .query(query)
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after(response.headers());
                if attempt >= MAX_ATTEMPTS {
                    return Err(FetchError::RateLimited {
                        retry_after_secs: wait,
                    });
                }
                tracing::debug!(url, attempt, wait, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                return Err(error_for(status, response).await);
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| FetchError::Parse(e.to_string()));
        }
    }
}

/// Seconds to wait according to a Retry-After header
fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// Map a non-success response to a [`FetchError`]
async fn error_for(status: StatusCode, response: reqwest::Response) -> FetchError {
    // Try to parse error response
    let message = match response.json::<dto::ApiError>().await {
        Ok(error) => error.error.message,
        Err(_) => status.canonical_reason().unwrap_or("Unknown").to_string(),
    };

    if status == StatusCode::UNAUTHORIZED {
        return FetchError::Auth(message);
    }

    FetchError::Http {
        status: status.as_u16(),
        message,
    }
}
