use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("API error: {message}")]
    Api { message: String },

    #[error("Invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },

    #[error("Row shape mismatch: {0}")]
    Shape(String),

    #[error("Unsupported value in column '{column}'")]
    UnsupportedValue { column: String },

    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
