//! Table, column and service constants shared by the jobs.

// Source tables
pub const TRACK_INFO_TABLE: &str = "track_info";
pub const ARTIST_INFO_TABLE: &str = "artist_info";
pub const ENDSONG_TABLE: &str = "endsong";
pub const TRACK_AUDIO_FEATURES_TABLE: &str = "track_audio_features";

// Derived tables
pub const ARTISTS_GENRES_TABLE: &str = "artists_genres";
pub const TRACKS_ARTISTS_TABLE: &str = "tracks_artists";
pub const SUNRISE_TABLE: &str = "sunrise";

// Export files, relative to the configured export directory
pub const ENDSONG_CSV: &str = "endsong.csv";
pub const TRACK_AUDIO_FEATURES_CSV: &str = "track_audio_features.csv";

/// Separator used for every multi-valued text column (`genres`, `artist_uris`).
pub const LIST_DELIMITER: char = ';';
pub const LIST_DELIMITER_STR: &str = ";";

/// Separator inside catalog URIs such as `spotify:track:<id>`.
pub const URI_DELIMITER: char = ':';

/// Position of the bare id inside a catalog URI.
pub const URI_ID_SEGMENT: usize = 2;

/// Maximum number of ids the catalog accepts per artist lookup.
pub const ARTIST_BATCH_SIZE: usize = 50;

pub const DEFAULT_DATABASE_PATH: &str = "data/spotify.db";
pub const DEFAULT_EXPORT_DIR: &str = "data";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const DEFAULT_SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

pub const DEFAULT_SUNRISE_URL: &str = "https://api.sunrise-sunset.org/json";
pub const DEFAULT_LATITUDE: f64 = -37.8136;
pub const DEFAULT_LONGITUDE: f64 = 144.9631;
pub const DEFAULT_TIMEZONE: &str = "Australia/Melbourne";

pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "listening_etl.log";

// Job names, as used on the command line and in logs
pub const ARTIST_INFO_JOB: &str = "artist-info";
pub const ARTISTS_GENRES_JOB: &str = "artists-genres";
pub const TRACKS_ARTISTS_JOB: &str = "tracks-artists";
pub const SUNRISE_JOB: &str = "sunrise";
pub const EXPORT_ENDSONG_JOB: &str = "export-endsong";
pub const EXPORT_AUDIO_FEATURES_JOB: &str = "export-audio-features";

/// All jobs in the order `run-all` executes them.
pub fn get_supported_jobs() -> Vec<&'static str> {
    vec![
        ARTIST_INFO_JOB,
        ARTISTS_GENRES_JOB,
        TRACKS_ARTISTS_JOB,
        SUNRISE_JOB,
        EXPORT_ENDSONG_JOB,
        EXPORT_AUDIO_FEATURES_JOB,
    ]
}
