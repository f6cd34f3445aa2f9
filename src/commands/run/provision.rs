use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::util::parent_directory;

/// Creates the containing directory of every path that is missing one.
///
/// All directories are attempted; the first failure is returned once the
/// rest have been tried. Returns the directories that were created.
pub(crate) fn provision_paths(paths: &[&Path]) -> Result<Vec<PathBuf>> {
    let folders: BTreeSet<&Path> = paths.iter().filter_map(|path| parent_directory(path)).collect();

    let mut created = Vec::new();
    let mut first_failure = None;

    for folder in folders {
        if folder.is_dir() {
            debug!(folder = %folder.display(), "folder already exists");
            continue;
        }

        match fs::create_dir_all(folder) {
            Ok(()) => {
                info!(folder = %folder.display(), "created folder");
                created.push(folder.to_path_buf());
            }
            Err(source) => {
                warn!(folder = %folder.display(), error = %source, "failed to create folder");
                if first_failure.is_none() {
                    first_failure = Some(PipelineError::PathCreation {
                        path: folder.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(created),
    }
}
