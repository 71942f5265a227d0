//! Spotify accounts service: authorization-code flow
//!
//! The user visits [`SpotifyAuth::authorize_url`] once, pastes the returned
//! code into `authorize`, and the resulting refresh token is stored in the
//! settings file. Every ingestion run trades it for a short-lived access token.
//!
//! See: https://developer.spotify.com/documentation/web-api/tutorials/code-flow

use reqwest::StatusCode;

use super::dto;
use crate::config::SpotifyCredentials;
use crate::error::FetchError;

/// Accounts service base URL
const ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";

/// OAuth client for the accounts service
pub struct SpotifyAuth {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    base_url: String,
}

impl SpotifyAuth {
    /// Create a client from the configured application credentials
    pub fn new(credentials: &SpotifyCredentials) -> Result<Self, FetchError> {
        Self::with_base_url(credentials, ACCOUNTS_BASE_URL)
    }

    /// Create a client against a custom accounts URL
    pub fn with_base_url(
        credentials: &SpotifyCredentials,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: credentials.redirect_uri.clone(),
            scope: credentials.scope.clone(),
            base_url: base_url.into(),
        })
    }

    /// URL the user opens to grant access
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
        )
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The response carries the refresh token to persist.
    pub async fn exchange_code(&self, code: &str) -> Result<dto::TokenResponse, FetchError> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;

        if token.refresh_token.is_none() {
            return Err(FetchError::Auth(
                "token response did not include a refresh token".to_string(),
            ));
        }
        Ok(token)
    }

    /// Trade a refresh token for a fresh access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<dto::TokenResponse, FetchError> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// POST to the token endpoint with HTTP basic client authentication
    async fn request_token(
        &self,
        params: &[(&str, &str)],
    ) -> Result<dto::TokenResponse, FetchError> {
        let url = format!("{}/api/token", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let message = match response.json::<dto::AuthError>().await {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => status.to_string(),
            };
            return Err(FetchError::Auth(message));
        }

        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        response
            .json::<dto::TokenResponse>()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))
    }
}
