use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::model::ResultRow;
use crate::util::parent_directory;

/// Writes `title` followed by one line per row, truncating any previous
/// file at `output_path`.
pub(crate) fn write_report(rows: &[ResultRow], output_path: &Path, title: &str) -> Result<()> {
    let write_error = |source: std::io::Error| PipelineError::ResultWrite {
        path: output_path.to_path_buf(),
        source,
    };

    if let Some(parent) = parent_directory(output_path) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let mut writer = BufWriter::new(File::create(output_path).map_err(write_error)?);
    writeln!(writer, "{title}").map_err(write_error)?;
    for row in rows {
        writeln!(writer, "{row}").map_err(write_error)?;
    }
    writer.flush().map_err(write_error)?;

    info!(path = %output_path.display(), rows = rows.len(), "wrote report");
    Ok(())
}

/// Removes a report left by an earlier run so a failed query never leaves
/// outdated rows behind.
pub(crate) fn discard_stale_report(output_path: &Path) {
    match fs::remove_file(output_path) {
        Ok(()) => info!(path = %output_path.display(), "removed stale report"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %output_path.display(), error = %err, "failed to remove stale report"),
    }
}
