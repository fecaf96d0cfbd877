use crate::apis::{build_http_client, ensure_success};
use crate::config::{HttpConfig, SpotifyConfig};
use crate::constants::ARTIST_BATCH_SIZE;
use crate::error::{EtlError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Source of artist records, looked up by bare catalog id.
#[async_trait::async_trait]
pub trait ArtistCatalog: Send + Sync {
    fn api_name(&self) -> &'static str;

    /// Look up at most [`ARTIST_BATCH_SIZE`] ids in one call, in request order.
    async fn get_artists(&self, ids: &[String]) -> Result<Vec<CatalogArtist>>;
}

/// Artist object as the catalog returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CatalogArtist {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub genres: Vec<String>,
    pub popularity: i64,
    pub followers: Followers,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Followers {
    pub total: i64,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Unknown ids come back as `null` entries.
#[derive(Debug, Deserialize)]
pub struct ArtistsResponse {
    pub artists: Vec<Option<CatalogArtist>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Tokens are dropped this long before the server-side expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Spotify Web API client using the client-credentials flow.
pub struct SpotifyClient {
    client: reqwest::Client,
    api_base: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(config: &SpotifyConfig, http: &HttpConfig) -> Result<Self> {
        let (client_id, client_secret) = config.credentials()?;
        Ok(Self {
            client: build_http_client(http)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn artists_url(&self) -> String {
        format!("{}/artists", self.api_base)
    }

    /// Bearer token, reused until shortly before it expires.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        debug!("Requesting client-credentials token from {}", self.token_url);
        let resp = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let body = ensure_success(resp, "token endpoint").await?;
        let token: TokenResponse = serde_json::from_str(&body)?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        info!(
            "Obtained {} token (expires in {}s)",
            token.token_type.as_deref().unwrap_or("bearer"),
            lifetime.as_secs()
        );

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(token.access_token)
    }
}

/// Keep the artists in a lookup response, warning about unknown ids.
pub fn present_artists(response: ArtistsResponse, requested: &[String]) -> Vec<CatalogArtist> {
    response
        .artists
        .into_iter()
        .enumerate()
        .filter_map(|(i, artist)| {
            if artist.is_none() {
                warn!(
                    "Catalog returned no artist for id {}",
                    requested.get(i).map(String::as_str).unwrap_or("?")
                );
            }
            artist
        })
        .collect()
}

#[async_trait::async_trait]
impl ArtistCatalog for SpotifyClient {
    fn api_name(&self) -> &'static str {
        "spotify"
    }

    #[instrument(skip(self, ids), fields(batch_len = ids.len()))]
    async fn get_artists(&self, ids: &[String]) -> Result<Vec<CatalogArtist>> {
        if ids.len() > ARTIST_BATCH_SIZE {
            return Err(EtlError::Api {
                message: format!(
                    "artist lookup accepts at most {} ids, got {}",
                    ARTIST_BATCH_SIZE,
                    ids.len()
                ),
            });
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.access_token().await?;
        let resp = self
            .client
            .get(self.artists_url())
            .query(&[("ids", ids.join(","))])
            .bearer_auth(token)
            .send()
            .await?;
        let body = ensure_success(resp, "artist lookup").await?;
        let parsed: ArtistsResponse = serde_json::from_str(&body)?;

        Ok(present_artists(parsed, ids))
    }
}
