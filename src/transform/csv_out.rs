use crate::error::{EtlError, Result};
use crate::types::RecordBatch;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Serialize `batch` with a header row. Returns the number of data rows.
pub fn write_csv_to<W: Write>(batch: &RecordBatch, writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(batch.columns())?;
    for row in batch.rows() {
        wtr.write_record(row.values().iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(batch.len())
}

/// Write `batch` to `path`, replacing any previous file.
///
/// The data goes to a sibling temp file first and is renamed into place.
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    let written = fs::File::create(&tmp_path)
        .map_err(EtlError::from)
        .and_then(|file| write_csv_to(batch, std::io::BufWriter::new(file)))
        .and_then(|rows| {
            fs::rename(&tmp_path, path)?;
            Ok(rows)
        });
    let rows = match written {
        Ok(rows) => rows,
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                warn!("Could not remove {}: {}", tmp_path.display(), cleanup);
            }
            return Err(e);
        }
    };

    info!("Wrote {} rows to {}", rows, path.display());
    Ok(rows)
}
