//! Removal of a previously produced output directory.

use std::fs;
use std::io;
use std::path::Path;

use crate::task::TaskError;

/// Recursively delete `dir`.
///
/// Returns `Ok(false)` when there was nothing to delete.
pub fn clean(dir: &Path) -> Result<bool, TaskError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::info!("Removed {}", dir.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Nothing to clean at {}", dir.display());
            Ok(false)
        }
        Err(e) => Err(TaskError::RemoveError {
            path: dir.display().to_string(),
            message: e.to_string(),
        }),
    }
}
