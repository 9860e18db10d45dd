//! Error types for the rirkit crate.
//!
//! This module provides a unified error type for dataset generation and
//! evaluation, so binaries can propagate failures with `?` and still tell
//! configuration mistakes apart from missing files or bad archive keys.

use thiserror::Error;

/// Error type for rirkit operations.
#[derive(Debug, Error)]
pub enum RirkitError {
    /// A grid axis has fewer than two positions.
    #[error("grid needs at least 2 positions along {axis}, got {count}")]
    InvalidGridCount {
        /// "x" or "y".
        axis: &'static str,
        /// Requested number of positions.
        count: usize,
    },

    /// Microphone arrays on neighbouring grid positions would overlap.
    #[error("microphone radius {radius} must be smaller than the {axis} grid spacing {spacing}")]
    MicRadiusTooLarge {
        /// Array radius in meters.
        radius: f64,
        /// "x" or "y".
        axis: &'static str,
        /// Grid spacing in meters.
        spacing: f64,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },

    /// An invalid DoA algorithm name was provided.
    #[error("invalid DoA algorithm name: '{name}'")]
    UnknownAlgorithm {
        /// The invalid algorithm name.
        name: String,
    },

    /// A pair key could not be parsed into two indices.
    #[error("malformed pair key '{key}': expected \"[source, mic]\"")]
    MalformedKey {
        /// The offending key.
        key: String,
    },

    /// A pair key refers to a row missing from the coordinate table.
    #[error("pair key '{key}' refers to index {index}, coordinate table has {len} rows")]
    IndexOutOfRange {
        /// The offending key.
        key: String,
        /// Index that does not resolve.
        index: usize,
        /// Number of rows in the coordinate table.
        len: usize,
    },

    /// A dataset expected in an archive is absent.
    #[error("dataset '{name}' not found in archive")]
    MissingDataset {
        /// Name of the dataset.
        name: String,
    },

    /// Array shapes cannot be combined.
    #[error("shape mismatch for '{name}': {message}")]
    ShapeMismatch {
        /// Name of the array or key.
        name: String,
        /// Shapes involved.
        message: String,
    },

    /// A line of the coordinate table cannot be parsed.
    #[error("malformed coordinate line {line}: '{content}'")]
    MalformedCoordinate {
        /// 1-based line number.
        line: usize,
        /// Raw line content.
        content: String,
    },

    /// A file operation failed (create, write, read).
    #[error("file operation failed for '{path}': {message}")]
    FileOperation {
        /// Path to the file.
        path: String,
        /// Error message describing the failure.
        message: String,
    },

    /// Directory creation failed.
    #[error(transparent)]
    DirectoryCreation(#[from] rirkit_env::EnvError),

    /// The room simulator rejected its input.
    #[error("room simulation failed: {0}")]
    Simulation(#[from] rirkit_roomsim::RoomSimError),

    /// I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WAV encoding error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// NPZ archive read error.
    #[error("NPZ read error: {0}")]
    NpzRead(#[from] ndarray_npy::ReadNpzError),
}

/// Result type alias for rirkit operations.
pub type Result<T> = std::result::Result<T, RirkitError>;

impl RirkitError {
    /// Returns true if this is a configuration error (fatal precondition).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RirkitError::InvalidGridCount { .. }
                | RirkitError::MicRadiusTooLarge { .. }
                | RirkitError::InvalidConfig { .. }
                | RirkitError::UnknownAlgorithm { .. }
        )
    }

    /// Returns true if this is a file/IO error.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            RirkitError::FileOperation { .. }
                | RirkitError::DirectoryCreation(_)
                | RirkitError::Io(_)
                | RirkitError::Wav(_)
                | RirkitError::NpzRead(_)
        )
    }

    /// Returns true if the error is tied to a single archive key, which
    /// callers may choose to skip instead of aborting.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            RirkitError::MalformedKey { .. }
                | RirkitError::IndexOutOfRange { .. }
                | RirkitError::MissingDataset { .. }
                | RirkitError::ShapeMismatch { .. }
        )
    }

    pub(crate) fn file_operation(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        RirkitError::FileOperation {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
