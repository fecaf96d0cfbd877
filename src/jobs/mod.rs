//! One module per ETL job. Every job gets its collaborators passed in and
//! returns a [`JobReport`]; [`run_job`] wires them up from a [`Config`].

pub mod artist_info;
pub mod artists_genres;
pub mod export;
pub mod sunrise;
pub mod tracks_artists;

use crate::apis::{SpotifyClient, SunriseSunsetClient};
use crate::config::Config;
use crate::constants;
use crate::db::{Database, TableSpec};
use crate::error::{EtlError, Result};
use crate::transform::extract_join_rows;
use crate::types::Scalar;
use metrics::{counter, histogram};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    ArtistInfo,
    ArtistsGenres,
    TracksArtists,
    Sunrise,
    ExportEndsong,
    ExportAudioFeatures,
}

impl Job {
    /// Every job, in the order `run-all` executes them.
    pub const ALL: [Job; 6] = [
        Job::ArtistInfo,
        Job::ArtistsGenres,
        Job::TracksArtists,
        Job::Sunrise,
        Job::ExportEndsong,
        Job::ExportAudioFeatures,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Job::ArtistInfo => constants::ARTIST_INFO_JOB,
            Job::ArtistsGenres => constants::ARTISTS_GENRES_JOB,
            Job::TracksArtists => constants::TRACKS_ARTISTS_JOB,
            Job::Sunrise => constants::SUNRISE_JOB,
            Job::ExportEndsong => constants::EXPORT_ENDSONG_JOB,
            Job::ExportAudioFeatures => constants::EXPORT_AUDIO_FEATURES_JOB,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Job {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Job::ALL
            .into_iter()
            .find(|job| job.name() == s.trim())
            .ok_or_else(|| {
                EtlError::Config(format!(
                    "unknown job '{}'; available: {}",
                    s,
                    constants::get_supported_jobs().join(", ")
                ))
            })
    }
}

/// Outcome of one job run
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: String,
    pub rows_read: usize,
    pub rows_written: usize,
    pub skipped: usize,
    pub api_calls: usize,
    /// Table name or file path the job wrote to.
    pub output: String,
    pub duration_secs: f64,
}

impl JobReport {
    pub fn new(job: Job, output: impl Into<String>) -> Self {
        Self {
            job: job.name().to_string(),
            rows_read: 0,
            rows_written: 0,
            skipped: 0,
            api_calls: 0,
            output: output.into(),
            duration_secs: 0.0,
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_secs = started.elapsed().as_secs_f64();
        counter!("etl_job_runs_total", "job" => self.job.clone()).increment(1);
        counter!("etl_rows_written_total", "job" => self.job.clone()).increment(self.rows_written as u64);
        counter!("etl_api_calls_total", "job" => self.job.clone()).increment(self.api_calls as u64);
        histogram!("etl_job_duration_seconds", "job" => self.job.clone()).record(self.duration_secs);
        self
    }
}

/// Split `right_column` of every row returned by `query` and rebuild `table`
/// from the resulting (left, token) pairs.
pub(crate) fn rebuild_join_table(
    db: &mut Database,
    job: Job,
    query: &str,
    left_column: &str,
    right_column: &str,
    table: &TableSpec,
) -> Result<JobReport> {
    let mut report = JobReport::new(job, table.name);

    let batch = db.query_batch(query)?;
    report.rows_read = batch.len();

    let extraction = extract_join_rows(&batch, left_column, right_column, constants::LIST_DELIMITER)?;
    report.skipped = extraction.skipped;
    report.rows_written = db.rebuild_table(
        table,
        extraction
            .rows
            .into_iter()
            .map(|r| vec![Scalar::Text(r.left), Scalar::Text(r.right)]),
    )?;

    info!(
        "{} source rows -> {} rows in {} ({} without relations)",
        report.rows_read, report.rows_written, table.name, report.skipped
    );
    Ok(report)
}

/// Open the database, run `job` against it and release the connection.
pub async fn run_job(job: Job, config: &Config) -> Result<JobReport> {
    let span = info_span!("job", name = %job);
    async move {
        info!("Starting job");
        let started = Instant::now();
        let mut db = Database::open(&config.database.path)?;

        let report = match job {
            Job::ArtistInfo => {
                let catalog = SpotifyClient::new(&config.spotify, &config.http)?;
                artist_info::run(&mut db, &catalog).await?
            }
            Job::ArtistsGenres => artists_genres::run(&mut db)?,
            Job::TracksArtists => tracks_artists::run(&mut db)?,
            Job::Sunrise => {
                let source = SunriseSunsetClient::new(&config.sunrise, &config.http)?;
                let zone = config.sunrise_timezone()?;
                sunrise::run(&db, &source, zone, config.sunrise.on_conflict).await?
            }
            Job::ExportEndsong => {
                let path = config.export.dir.join(constants::ENDSONG_CSV);
                export::export_endsong(&db, &path, config.export_timezone()?)?
            }
            Job::ExportAudioFeatures => {
                let path = config.export.dir.join(constants::TRACK_AUDIO_FEATURES_CSV);
                export::export_audio_features(&db, &path)?
            }
        };

        db.close()?;
        let report = report.finish(started);
        info!(
            rows_read = report.rows_read,
            rows_written = report.rows_written,
            skipped = report.skipped,
            api_calls = report.api_calls,
            "Job finished in {:.2}s",
            report.duration_secs
        );
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Run `jobs` in order, stopping at the first failure.
pub async fn run_jobs(jobs: &[Job], config: &Config) -> Result<Vec<JobReport>> {
    let mut reports = Vec::with_capacity(jobs.len());
    for job in jobs {
        reports.push(run_job(*job, config).await?);
    }
    Ok(reports)
}
