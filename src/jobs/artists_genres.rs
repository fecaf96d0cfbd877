use crate::constants::{ARTISTS_GENRES_TABLE, ARTIST_INFO_TABLE};
use crate::db::{ColumnDef, Database, TableSpec};
use crate::error::Result;
use crate::jobs::{rebuild_join_table, Job, JobReport};
use tracing::instrument;

pub const ARTISTS_GENRES: TableSpec = TableSpec {
    name: ARTISTS_GENRES_TABLE,
    columns: &[ColumnDef::text("artist_uri"), ColumnDef::text("genre")],
};

/// Rebuild `artists_genres` from the `;`-joined `artist_info.genres` column.
#[instrument(skip(db))]
pub fn run(db: &mut Database) -> Result<JobReport> {
    rebuild_join_table(
        db,
        Job::ArtistsGenres,
        &format!("SELECT uri, genres FROM {ARTIST_INFO_TABLE}"),
        "uri",
        "genres",
        &ARTISTS_GENRES,
    )
}
