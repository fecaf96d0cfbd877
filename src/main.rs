use clap::{Parser, Subcommand};
use listening_etl::config::{Config, ConflictPolicy};
use listening_etl::jobs::{self, Job, JobReport};
use listening_etl::logging;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "listening_etl")]
#[command(about = "Extract, reshape and export Spotify listening history")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (default: ./config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database to read from and write to
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up every artist in track_info and append them to artist_info
    ArtistInfo,
    /// Rebuild artists_genres from artist_info.genres
    ArtistsGenres,
    /// Rebuild tracks_artists from track_info.artist_uris
    TracksArtists,
    /// Store sunrise/sunset times for every listening date
    Sunrise {
        /// What to do with dates that are already stored
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictPolicy>,
    },
    /// Write the listening history to endsong.csv
    ExportEndsong {
        /// Directory to write into
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Write track_audio_features to track_audio_features.csv
    ExportAudioFeatures {
        /// Directory to write into
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Run several jobs in order, stopping at the first failure
    RunAll {
        /// Jobs to run (comma-separated). Available: artist-info, artists-genres,
        /// tracks-artists, sunrise, export-endsong, export-audio-features
        #[arg(long)]
        jobs: Option<String>,
    },
}

fn print_report(report: &JobReport) {
    println!("\n📊 Results for {}:", report.job);
    println!("   Rows read: {}", report.rows_read);
    println!("   Rows written: {}", report.rows_written);
    if report.skipped > 0 {
        println!("   Skipped: {}", report.skipped);
    }
    if report.api_calls > 0 {
        println!("   API calls: {}", report.api_calls);
    }
    println!("   Output: {}", report.output);
    println!("   Took: {:.2}s", report.duration_secs);
}

fn parse_job_list(list: &str) -> anyhow::Result<Vec<Job>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Job>().map_err(anyhow::Error::from))
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }

    let selected = match cli.command {
        Commands::ArtistInfo => vec![Job::ArtistInfo],
        Commands::ArtistsGenres => vec![Job::ArtistsGenres],
        Commands::TracksArtists => vec![Job::TracksArtists],
        Commands::Sunrise { on_conflict } => {
            if let Some(policy) = on_conflict {
                config.sunrise.on_conflict = policy;
            }
            vec![Job::Sunrise]
        }
        Commands::ExportEndsong { out_dir } => {
            if let Some(dir) = out_dir {
                config.export.dir = dir;
            }
            vec![Job::ExportEndsong]
        }
        Commands::ExportAudioFeatures { out_dir } => {
            if let Some(dir) = out_dir {
                config.export.dir = dir;
            }
            vec![Job::ExportAudioFeatures]
        }
        Commands::RunAll { jobs } => match jobs {
            Some(list) => parse_job_list(&list)?,
            None => Job::ALL.to_vec(),
        },
    };

    info!(
        "Running {} job(s) against {}",
        selected.len(),
        config.database.path.display()
    );
    println!("🚀 Running: {}", selected.iter().map(Job::name).collect::<Vec<_>>().join(", "));

    for job in selected {
        match jobs::run_job(job, &config).await {
            Ok(report) => print_report(&report),
            Err(e) => {
                error!("Job {} failed: {}", job, e);
                println!("❌ {} failed: {}", job, e);
                return Err(e.into());
            }
        }
    }

    println!("\n✅ Done");
    Ok(())
}
