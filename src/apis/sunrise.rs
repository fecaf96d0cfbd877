use crate::apis::{build_http_client, ensure_success};
use crate::config::{HttpConfig, SunriseConfig};
use crate::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Daily solar event times for a fixed location.
#[async_trait::async_trait]
pub trait SunriseSource: Send + Sync {
    async fn get_day(&self, date: NaiveDate) -> Result<SunriseResults>;
}

/// `results` object of a `formatted=0` response; timestamps are UTC ISO 8601.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SunriseResults {
    pub sunrise: String,
    pub sunset: String,
    pub solar_noon: String,
    /// Seconds between sunrise and sunset.
    pub day_length: i64,
    pub civil_twilight_begin: String,
    pub civil_twilight_end: String,
    pub nautical_twilight_begin: String,
    pub nautical_twilight_end: String,
    pub astronomical_twilight_begin: String,
    pub astronomical_twilight_end: String,
}

/// On failure the service sends a non-"OK" status and an empty `results`.
#[derive(Debug, Deserialize)]
struct SunriseEnvelope {
    status: String,
    #[serde(default)]
    results: serde_json::Value,
}

pub fn parse_response(body: &str) -> Result<SunriseResults> {
    let envelope: SunriseEnvelope = serde_json::from_str(body)?;
    if envelope.status != "OK" {
        return Err(EtlError::Api {
            message: format!("sunrise service returned status {}", envelope.status),
        });
    }
    Ok(serde_json::from_value(envelope.results)?)
}

/// Client for api.sunrise-sunset.org.
pub struct SunriseSunsetClient {
    client: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl SunriseSunsetClient {
    pub fn new(config: &SunriseConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(http)?,
            base_url: config.base_url.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
        })
    }

    pub fn query_params(&self, date: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("lat", self.latitude.to_string()),
            ("lng", self.longitude.to_string()),
            ("date", date.format("%Y-%m-%d").to_string()),
            ("formatted", "0".to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl SunriseSource for SunriseSunsetClient {
    #[instrument(skip(self))]
    async fn get_day(&self, date: NaiveDate) -> Result<SunriseResults> {
        debug!("Fetching sun times for {}", date);
        let resp = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(date))
            .send()
            .await?;
        let body = ensure_success(resp, "sunrise lookup").await?;
        parse_response(&body)
    }
}
