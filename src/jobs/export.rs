use crate::constants::{ENDSONG_TABLE, TRACK_AUDIO_FEATURES_TABLE, URI_ID_SEGMENT};
use crate::db::Database;
use crate::error::Result;
use crate::jobs::{Job, JobReport};
use crate::transform::{convert_timestamp, uri_segment, write_csv};
use crate::types::{RecordBatch, Scalar};
use chrono_tz::Tz;
use std::path::Path;
use tracing::{info, instrument};

/// Listening history projection, with the verbose metadata columns renamed.
pub const ENDSONG_EXPORT_QUERY: &str = "SELECT spotify_track_uri, \
    master_metadata_album_artist_name AS artist_name, \
    master_metadata_album_album_name AS album_name, \
    master_metadata_track_name AS track_name, \
    ts, ms_played, conn_country, reason_start, reason_end \
    FROM endsong WHERE spotify_track_uri IS NOT NULL";

/// Add `track_id` (id segment of the track URI) and `ts_local` (`ts` in `zone`).
pub fn derive_endsong_columns(batch: RecordBatch, zone: Tz) -> Result<RecordBatch> {
    batch
        .with_column("track_id", |row| {
            Ok(row
                .require("spotify_track_uri")?
                .as_str()
                .and_then(|uri| uri_segment(uri, URI_ID_SEGMENT))
                .map(|id| Scalar::Text(id.to_string()))
                .unwrap_or(Scalar::Null))
        })?
        .with_column("ts_local", |row| match row.require("ts")?.as_str() {
            Some(ts) => Ok(Scalar::Text(convert_timestamp(ts, zone)?)),
            None => Ok(Scalar::Null),
        })
}

#[instrument(skip(db, path, zone), fields(path = %path.display()))]
pub fn export_endsong(db: &Database, path: &Path, zone: Tz) -> Result<JobReport> {
    let mut report = JobReport::new(Job::ExportEndsong, path.display().to_string());

    let batch = db.query_batch(ENDSONG_EXPORT_QUERY)?;
    report.rows_read = batch.len();
    info!("Read {} plays from {}", batch.len(), ENDSONG_TABLE);

    let batch = derive_endsong_columns(batch, zone)?;
    report.rows_written = write_csv(&batch, path)?;
    Ok(report)
}

#[instrument(skip(db, path), fields(path = %path.display()))]
pub fn export_audio_features(db: &Database, path: &Path) -> Result<JobReport> {
    let mut report = JobReport::new(Job::ExportAudioFeatures, path.display().to_string());

    let batch = db.query_batch(&format!("SELECT * FROM {TRACK_AUDIO_FEATURES_TABLE}"))?;
    report.rows_read = batch.len();
    report.rows_written = write_csv(&batch, path)?;
    Ok(report)
}
