//! Environment variable utilities for rirkit
//!
//! This module resolves the save location shared by the evaluation binaries
//! and prepares output directories before a run writes anything.

use crate::constants::{DEFAULT_SAVE_LOC, SAVE_LOC_ENV};
use std::env;
use std::path::{Path, PathBuf};

/// Error type for environment and output location issues
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("{SAVE_LOC_ENV} points to a non-existent directory: {0}")]
    SaveLocNotFound(PathBuf),

    #[error("failed to create output directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolve the save location holding experiment and inference outputs
///
/// Resolution order:
/// 1. the explicit value (usually a CLI flag)
/// 2. the `RIRKIT_SAVE_LOC` environment variable, which must exist
/// 3. `./results`
///
/// # Errors
///
/// Returns an error if the environment variable is set to a missing directory.
///
/// # Example
///
/// ```no_run
/// use rirkit_env::env_utils::get_save_loc;
///
/// let save_loc = get_save_loc(None)?;
/// println!("Save location: {}", save_loc.display());
/// # Ok::<(), rirkit_env::env_utils::EnvError>(())
/// ```
pub fn get_save_loc(explicit: Option<&Path>) -> Result<PathBuf, EnvError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Ok(save_loc) = env::var(SAVE_LOC_ENV) {
        let path = PathBuf::from(save_loc);
        if !path.is_dir() {
            return Err(EnvError::SaveLocNotFound(path));
        }
        return Ok(path);
    }

    Ok(PathBuf::from(DEFAULT_SAVE_LOC))
}

/// Directory that must exist before `path` can be written.
///
/// A path with an extension names a file and yields its parent; a path
/// without one names a directory and yields itself.
pub fn output_dir_of(path: &Path) -> Option<&Path> {
    if path.extension().is_some() {
        path.parent().filter(|p| !p.as_os_str().is_empty())
    } else if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Create the directory needed to write `path`, including missing parents
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_output_dir(path: &Path) -> Result<(), EnvError> {
    if let Some(dir) = output_dir_of(path)
        && !dir.exists()
    {
        std::fs::create_dir_all(dir).map_err(|source| EnvError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
