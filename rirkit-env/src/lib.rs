//! rirkit environment and constants
//!
//! This crate provides shared environment utilities and constants for the rirkit workspace.
//! It centralizes environment variable handling and default file locations.

pub mod constants;
pub mod env_utils;

// Re-export commonly used items
pub use constants::{
    DEFAULT_DOA_OUTPUT, DEFAULT_INFERENCE_ARCHIVE, DEFAULT_INFERENCE_LOC, DEFAULT_MINMAX_PATH,
    DEFAULT_POINTS_PATH, DEFAULT_RESULTS_DIR, DEFAULT_SAVE_LOC, DEFAULT_SPECTRAL_ARCHIVE,
    SAVE_LOC_ENV,
};
pub use env_utils::{EnvError, ensure_output_dir, get_save_loc, output_dir_of};
