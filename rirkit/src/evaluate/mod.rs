//! Evaluation of acoustic field predictions against ground truth

pub mod doa;
pub mod spectral;

pub use doa::{
    AlgorithmSummary, AlgorithmValues, DoaEvaluator, DoaReport, DoaValues, ErrorSeries,
    run_doa_evaluation, true_bearing_degrees,
};
pub use spectral::{
    MeanAbsoluteError, MeanSquaredError, SpectralDistance, SpectralReport, SpectralStats,
    distance_for, evaluate_spectral,
};
