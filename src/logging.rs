use crate::constants::{LOG_DIR, LOG_FILE_PREFIX};
use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "listening_etl=info";

/// Console output for the operator plus a JSON log per day under `logs/`.
///
/// `RUST_LOG` replaces the default `listening_etl=info` filter.
pub fn init_logging() {
    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Cannot create {LOG_DIR}/ ({e}); file logging may be lost");
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, LOG_FILE_PREFIX));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();

    // flushes on drop; every job runs until process exit
    std::mem::forget(guard);
}
