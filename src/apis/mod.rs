pub mod spotify;
pub mod sunrise;

use crate::config::HttpConfig;
use crate::error::Result;
use std::time::Duration;

pub use spotify::{ArtistCatalog, CatalogArtist, SpotifyClient};
pub use sunrise::{SunriseResults, SunriseSource, SunriseSunsetClient};

pub(crate) fn build_http_client(http: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(http.timeout_seconds))
        .user_agent(concat!("listening_etl/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Turn a non-2xx response into an API error carrying the body.
pub(crate) async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(crate::error::EtlError::Api {
            message: format!("{what} returned HTTP {}: {}", status.as_u16(), body.trim()),
        });
    }
    Ok(body)
}
