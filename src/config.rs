use crate::constants;
use crate::error::{EtlError, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SPOTIFY_CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";
pub const DATABASE_PATH_ENV: &str = "LISTENING_ETL_DB";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub spotify: SpotifyConfig,
    pub sunrise: SunriseConfig,
    pub export: ExportConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_DATABASE_PATH),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: String,
    pub token_url: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: constants::DEFAULT_SPOTIFY_API_BASE.to_string(),
            token_url: constants::DEFAULT_SPOTIFY_TOKEN_URL.to_string(),
        }
    }
}

impl SpotifyConfig {
    /// Client id and secret, or a config error naming whichever is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let id = non_empty(self.client_id.as_deref()).ok_or_else(|| {
            EtlError::Config(format!(
                "spotify.client_id is not set (config file or {SPOTIFY_CLIENT_ID_ENV})"
            ))
        })?;
        let secret = non_empty(self.client_secret.as_deref()).ok_or_else(|| {
            EtlError::Config(format!(
                "spotify.client_secret is not set (config file or {SPOTIFY_CLIENT_SECRET_ENV})"
            ))
        })?;
        Ok((id, secret))
    }
}

/// What the sunrise job does with a date that already has a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the stored row alone and skip the lookup.
    #[default]
    Skip,
    /// Insert anyway and let the primary key reject it.
    Fail,
    /// Fetch again and overwrite the stored row.
    Replace,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SunriseConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub base_url: String,
    pub on_conflict: ConflictPolicy,
}

impl Default for SunriseConfig {
    fn default() -> Self {
        Self {
            latitude: constants::DEFAULT_LATITUDE,
            longitude: constants::DEFAULT_LONGITUDE,
            timezone: constants::DEFAULT_TIMEZONE.to_string(),
            base_url: constants::DEFAULT_SUNRISE_URL.to_string(),
            on_conflict: ConflictPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: PathBuf,
    /// Zone that `ts_local` is rendered in.
    pub timezone: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_EXPORT_DIR),
            timezone: constants::DEFAULT_TIMEZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: constants::DEFAULT_HTTP_TIMEOUT_SECONDS,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `config.toml`), then apply environment overrides.
    ///
    /// A missing file falls back to defaults; a file that exists but fails to
    /// parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Path::new(constants::DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                EtlError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            info!("Loaded configuration from {}", config_path.display());
            Self::from_toml_str(&config_content)?
        } else if path.is_some() {
            return Err(EtlError::Config(format!(
                "Config file '{}' does not exist",
                config_path.display()
            )));
        } else {
            debug!("No {} found, using defaults", config_path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from an environment-like lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup(SPOTIFY_CLIENT_ID_ENV) {
            self.spotify.client_id = Some(id);
        }
        if let Some(secret) = lookup(SPOTIFY_CLIENT_SECRET_ENV) {
            self.spotify.client_secret = Some(secret);
        }
        if let Some(db) = lookup(DATABASE_PATH_ENV) {
            if !db.trim().is_empty() {
                self.database.path = PathBuf::from(db);
            }
        }
    }

    pub fn sunrise_timezone(&self) -> Result<Tz> {
        parse_timezone(&self.sunrise.timezone)
    }

    pub fn export_timezone(&self) -> Result<Tz> {
        parse_timezone(&self.export.timezone)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| EtlError::UnknownTimeZone(name.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
