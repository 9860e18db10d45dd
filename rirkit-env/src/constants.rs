//! Default locations shared by the simulation and evaluation binaries.

/// Environment variable overriding the default save location
pub const SAVE_LOC_ENV: &str = "RIRKIT_SAVE_LOC";

/// Save location used when neither the CLI nor the environment provides one
pub const DEFAULT_SAVE_LOC: &str = "./results";

/// Sub directory of the save location holding inference outputs
pub const DEFAULT_INFERENCE_LOC: &str = "inference_out";

/// Coordinate table written by the simulator and read by the DoA evaluator
pub const DEFAULT_POINTS_PATH: &str = "./wav_data/points.txt";

/// Bounding box of the room, used to de-normalize model outputs
pub const DEFAULT_MINMAX_PATH: &str = "./minmax/minmax.json";

/// Directory receiving one WAV file per (source, microphone array, channel)
pub const DEFAULT_RESULTS_DIR: &str = "./wav_data/raw/";

/// Ground-truth and network waveforms produced by the inference step
pub const DEFAULT_INFERENCE_ARCHIVE: &str = "./results/inference_wav/output_test_NAF.json";

/// Magnitude and phase spectra produced by the inference step
pub const DEFAULT_SPECTRAL_ARCHIVE: &str = "output_test_NAF.npz";

/// Per-algorithm DoA responses written by the DoA evaluator
pub const DEFAULT_DOA_OUTPUT: &str = "./DoA.json";
