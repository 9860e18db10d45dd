//! Room impulse response datasets and evaluation of acoustic field models
//!
//! This crate covers both ends of a neural acoustic field experiment:
//!
//! - **Dataset generation**: a grid of source positions and circular
//!   microphone arrays in a shoebox room, one impulse response per source,
//!   array and channel written as WAV files together with the coordinate
//!   table and room bounding box ([`dataset::run_simulation`])
//! - **DoA evaluation**: direction of arrival error of predicted waveforms
//!   with seven classic estimators ([`evaluate::run_doa_evaluation`])
//! - **Spectral evaluation**: de-normalized magnitude and phase distance of
//!   predicted spectra ([`evaluate::evaluate_spectral`])
//!
//! Every numerical collaborator sits behind a trait so it can be replaced:
//! [`RoomSimulator`], [`stft::SpectralTransform`], [`doa::DoaBackend`],
//! [`dataset::RirSink`], [`spectral_archive::SpectralStore`] and
//! [`evaluate::SpectralDistance`].

pub mod archive;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod doa;
pub mod error;
pub mod evaluate;
pub mod grid;
pub mod points;
pub mod spectral_archive;
pub mod stft;

pub use config::{DoaConfig, SimulationConfig, SourceRange, SpectralConfig};
pub use error::{Result, RirkitError};

// Re-export the room simulation crate
pub use rirkit_roomsim::{
    Directivity, ImageSourceSimulator, Microphone, Point3D, RoomSimError, RoomSimulator, ShoeBox,
};
