use crate::error::{EtlError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Rendering used for every converted timestamp, e.g. `2021-03-07 06:58:12+11:00`.
pub const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

const OFFSET_FORMATS: &[&str] = &[LOCAL_FORMAT, "%Y-%m-%d %H:%M:%S%.f%:z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a timestamp as an instant.
///
/// Values carrying an offset (RFC 3339 or the local rendering above) keep it;
/// values without one are taken to be UTC.
pub fn parse_utc(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(EtlError::Timestamp {
        value: value.to_string(),
        reason: "unrecognised timestamp format".to_string(),
    })
}

pub fn to_local(instant: DateTime<Utc>, zone: Tz) -> DateTime<Tz> {
    instant.with_timezone(&zone)
}

pub fn format_local(local: &DateTime<Tz>) -> String {
    local.format(LOCAL_FORMAT).to_string()
}

/// Parse `value`, shift it into `zone` and render it.
pub fn convert_timestamp(value: &str, zone: Tz) -> Result<String> {
    let instant = parse_utc(value)?;
    Ok(format_local(&to_local(instant, zone)))
}
