use crate::apis::{ArtistCatalog, CatalogArtist};
use crate::constants::{
    ARTIST_BATCH_SIZE, ARTIST_INFO_TABLE, LIST_DELIMITER, LIST_DELIMITER_STR, TRACK_INFO_TABLE,
};
use crate::db::{ColumnDef, Database, TableSpec};
use crate::error::Result;
use crate::jobs::{Job, JobReport};
use crate::transform::{id_from_uri, unique_tokens};
use crate::types::Scalar;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const ARTIST_INFO: TableSpec = TableSpec {
    name: ARTIST_INFO_TABLE,
    columns: &[
        ColumnDef::text("id"),
        ColumnDef::text("genres"),
        ColumnDef::text("name"),
        ColumnDef::integer("popularity"),
        ColumnDef::text("type"),
        ColumnDef::text("uri"),
        ColumnDef::integer("total_followers"),
    ],
};

/// Flattened artist row as stored in `artist_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRecord {
    pub id: String,
    /// Genres joined with `;`, the encoding the genre split job expects.
    pub genres: String,
    pub name: String,
    pub popularity: i64,
    pub kind: String,
    pub uri: String,
    pub total_followers: i64,
}

impl From<CatalogArtist> for ArtistRecord {
    fn from(artist: CatalogArtist) -> Self {
        Self {
            id: artist.id,
            genres: artist.genres.join(LIST_DELIMITER_STR),
            name: artist.name,
            popularity: artist.popularity,
            kind: artist.kind,
            uri: artist.uri,
            total_followers: artist.followers.total,
        }
    }
}

impl ArtistRecord {
    pub fn into_row(self) -> Vec<Scalar> {
        vec![
            self.id.into(),
            self.genres.into(),
            self.name.into(),
            self.popularity.into(),
            self.kind.into(),
            self.uri.into(),
            self.total_followers.into(),
        ]
    }
}

/// Unique artist ids referenced by `track_info.artist_uris`, first-seen order.
pub fn collect_artist_ids(db: &Database) -> Result<Vec<String>> {
    let batch = db.query_batch(&format!("SELECT artist_uris FROM {TRACK_INFO_TABLE}"))?;
    let fields = batch.column("artist_uris")?;
    let uris = unique_tokens(fields.into_iter().map(Scalar::as_str), LIST_DELIMITER);

    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(uris.len());
    for uri in &uris {
        match id_from_uri(uri) {
            Some(id) if seen.insert(id.to_string()) => ids.push(id.to_string()),
            Some(_) => {}
            None => warn!("Skipping malformed artist uri '{}'", uri),
        }
    }
    Ok(ids)
}

/// Issue one catalog call per `batch_size` ids and concatenate the results in batch order.
///
/// Returns the artists and the number of calls made. The first failing call
/// aborts the whole lookup.
pub async fn lookup_in_batches(
    catalog: &dyn ArtistCatalog,
    ids: &[String],
    batch_size: usize,
) -> Result<(Vec<CatalogArtist>, usize)> {
    let batch_size = batch_size.max(1);
    let total = ids.len().div_ceil(batch_size);
    let mut artists = Vec::with_capacity(ids.len());
    let mut calls = 0;

    for (i, batch) in ids.chunks(batch_size).enumerate() {
        info!(
            "Batch {} of {} ({} remaining) from {}",
            i + 1,
            total,
            total - i,
            catalog.api_name()
        );
        artists.extend(catalog.get_artists(batch).await?);
        calls += 1;
    }
    Ok((artists, calls))
}

/// Enrich every artist referenced by `track_info` and append them to `artist_info`.
#[instrument(skip(db, catalog))]
pub async fn run(db: &mut Database, catalog: &dyn ArtistCatalog) -> Result<JobReport> {
    let started = Instant::now();
    let mut report = JobReport::new(Job::ArtistInfo, ARTIST_INFO_TABLE);

    let ids = collect_artist_ids(db)?;
    report.rows_read = ids.len();
    info!("Found {} unique artists in {}", ids.len(), TRACK_INFO_TABLE);

    let (artists, calls) = lookup_in_batches(catalog, &ids, ARTIST_BATCH_SIZE).await?;
    report.api_calls = calls;
    report.skipped = ids.len().saturating_sub(artists.len());

    db.create_table_if_missing(&ARTIST_INFO)?;
    let rows = artists
        .into_iter()
        .map(|a| ArtistRecord::from(a).into_row());
    report.rows_written = db.append_rows(&ARTIST_INFO, rows)?;

    info!(
        "Stored {} artists in {:.2}s",
        report.rows_written,
        started.elapsed().as_secs_f64()
    );
    Ok(report)
}
