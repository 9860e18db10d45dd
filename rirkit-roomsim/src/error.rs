//! Error types for room simulation.

use thiserror::Error;

/// Error type for room construction and impulse response rendering.
#[derive(Debug, Error)]
pub enum RoomSimError {
    /// Room dimensions are missing, non-positive or of an unsupported rank.
    #[error("invalid room dimensions {dims:?}: {reason}")]
    InvalidDimensions {
        /// Dimensions as provided.
        dims: Vec<f64>,
        /// Why they were rejected.
        reason: String,
    },

    /// The requested reverberation time needs more absorption than walls can provide.
    #[error("RT60 of {rt60}s is unreachable: required absorption {absorption:.3} exceeds 1")]
    Rt60Unreachable {
        /// Requested reverberation time in seconds.
        rt60: f64,
        /// Absorption the inverse Sabine relation asked for.
        absorption: f64,
    },

    /// Absorption coefficient outside [0, 1].
    #[error("invalid absorption coefficient {0}, expected a value in [0, 1]")]
    InvalidAbsorption(f64),

    /// Sample rate is not strictly positive.
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f64),

    /// A source or microphone lies outside the room.
    #[error("{what} at ({x:.3}, {y:.3}, {z:.3}) lies outside the room")]
    OutsideRoom {
        /// "source" or "microphone N".
        what: String,
        /// X coordinate in meters.
        x: f64,
        /// Y coordinate in meters.
        y: f64,
        /// Z coordinate in meters.
        z: f64,
    },
}
