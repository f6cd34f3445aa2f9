use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::error::{PipelineError, Result};

use super::script::{execute_script, read_script};

/// Creates an empty database file at `path` unless one already exists.
/// Returns `true` when a new file was created.
pub(crate) fn ensure_database(path: &Path) -> Result<bool> {
    if path.exists() {
        info!(path = %path.display(), "database already exists");
        return Ok(false);
    }

    Connection::open(path).map_err(|source| PipelineError::DatabaseOpen {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), "created database");
    Ok(true)
}

/// Opens an existing database read-write. Never creates the file.
pub(crate) fn open_database(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    Connection::open_with_flags(path, flags).map_err(|source| PipelineError::DatabaseOpen {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn apply_schema(db_path: &Path, ddl_path: &Path) -> Result<()> {
    let ddl = read_script(ddl_path)?;
    let mut connection = open_database(db_path)?;

    execute_script(&mut connection, &ddl).map_err(|source| {
        PipelineError::SchemaExecution {
            path: ddl_path.to_path_buf(),
            source,
        }
    })?;

    info!(script = %ddl_path.display(), "applied schema");
    Ok(())
}
