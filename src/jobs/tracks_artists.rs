use crate::constants::{TRACKS_ARTISTS_TABLE, TRACK_INFO_TABLE};
use crate::db::{ColumnDef, Database, TableSpec};
use crate::error::Result;
use crate::jobs::{rebuild_join_table, Job, JobReport};
use tracing::instrument;

pub const TRACKS_ARTISTS: TableSpec = TableSpec {
    name: TRACKS_ARTISTS_TABLE,
    columns: &[ColumnDef::text("track_uri"), ColumnDef::text("artist_uri")],
};

/// Rebuild `tracks_artists` from the `;`-joined `track_info.artist_uris` column.
#[instrument(skip(db))]
pub fn run(db: &mut Database) -> Result<JobReport> {
    rebuild_join_table(
        db,
        Job::TracksArtists,
        &format!("SELECT uri, artist_uris FROM {TRACK_INFO_TABLE}"),
        "uri",
        "artist_uris",
        &TRACKS_ARTISTS,
    )
}
