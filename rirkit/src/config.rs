//! Configuration of the simulation and evaluation runs.
//!
//! Each run is a function over one of these structs. Defaults reproduce the
//! experiment the dataset was generated with; any field can be overridden from
//! a JSON file or the command line.

use crate::cli::{ErrorUnits, SpectralMetric};
use crate::doa::DoaAlgorithm;
use crate::error::{Result, RirkitError};
use crate::grid::GridSpec;
use rirkit_env::{
    DEFAULT_DOA_OUTPUT, DEFAULT_INFERENCE_ARCHIVE, DEFAULT_INFERENCE_LOC, DEFAULT_MINMAX_PATH,
    DEFAULT_POINTS_PATH, DEFAULT_RESULTS_DIR, DEFAULT_SPECTRAL_ARCHIVE, get_save_loc,
};
use rirkit_roomsim::{SPEED_OF_SOUND, ShoeBox};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Simulation
// ============================================================================

/// Half-open range of source indices to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

/// RIR dataset generation settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of grid positions along x
    pub grid_x: usize,
    /// Number of grid positions along y
    pub grid_y: usize,
    /// Height of sources and microphone arrays (m)
    pub height: f64,
    /// Distance between the walls and the outermost grid positions (m)
    pub margin: f64,
    /// Radius of the circular microphone arrays (m)
    pub mic_radius: f64,
    /// Number of microphones per array
    pub mic_count: usize,
    /// Use cardioid capsules facing outwards instead of omnidirectional ones
    pub mic_directivity: bool,
    /// Coordinate table written on the first pass
    pub points_path: PathBuf,
    /// Bounding box of the room written on the first pass
    pub minmax_path: PathBuf,
    /// Directory receiving the WAV files
    pub results_dir: PathBuf,
    /// Target reverberation time (s)
    pub rt60: f64,
    /// Room width, depth and height (m)
    pub room_dim: [f64; 3],
    /// Sample rate of the impulse responses (Hz)
    pub sample_rate: u32,
    /// Speed of sound (m/s)
    pub speed_of_sound: f64,
    /// Length of the fractional delay filter (taps)
    pub fractional_delay_length: usize,
    /// Reflection order override; derived from the RT60 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_order: Option<usize>,
    /// Skip sources whose files already exist
    pub skip_existing: bool,
    /// Restrict the run to a range of source indices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_range: Option<SourceRange>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_x: 13,
            grid_y: 13,
            height: 1.35,
            margin: 0.5,
            mic_radius: 0.1,
            mic_count: 4,
            mic_directivity: false,
            points_path: PathBuf::from(DEFAULT_POINTS_PATH),
            minmax_path: PathBuf::from(DEFAULT_MINMAX_PATH),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            rt60: 0.5,
            room_dim: [7.0, 6.4, 2.7],
            sample_rate: 48000,
            speed_of_sound: SPEED_OF_SOUND,
            fractional_delay_length: 81,
            max_order: None,
            skip_existing: false,
            source_range: None,
        }
    }
}

impl SimulationConfig {
    /// Grid over the room footprint
    pub fn grid(&self) -> GridSpec {
        GridSpec {
            width: self.room_dim[0],
            depth: self.room_dim[1],
            num_x: self.grid_x,
            num_y: self.grid_y,
            margin: self.margin,
            height: self.height,
        }
    }

    /// Room model with absorption from the inverse Sabine relation
    pub fn room(&self) -> Result<ShoeBox> {
        let mut room = ShoeBox::from_rt60(
            self.room_dim,
            self.rt60,
            self.sample_rate as f64,
            self.speed_of_sound,
        )?;
        if let Some(order) = self.max_order {
            room.max_order = order;
        }
        Ok(room)
    }

    /// Source indices this run covers
    pub fn sources(&self) -> std::ops::Range<usize> {
        let total = self.grid_x * self.grid_y;
        match self.source_range {
            Some(range) => range.start.min(total)..range.end.min(total),
            None => 0..total,
        }
    }

    /// Check every precondition before anything is written
    pub fn validate(&self) -> Result<()> {
        let grid = self.grid();
        grid.check_mic_radius(self.mic_radius)?;

        if self.mic_count == 0 {
            return Err(invalid("mic_count must be at least 1"));
        }
        if self.mic_radius <= 0.0 {
            return Err(invalid(format!(
                "mic_radius ({}) must be positive",
                self.mic_radius
            )));
        }
        if self.rt60 <= 0.0 {
            return Err(invalid(format!("rt60 ({}) must be positive", self.rt60)));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        if self.fractional_delay_length == 0 {
            return Err(invalid("fractional_delay_length must be at least 1"));
        }
        if !(self.height > 0.0 && self.height < self.room_dim[2]) {
            return Err(invalid(format!(
                "height ({}) must lie inside the room (0, {})",
                self.height, self.room_dim[2]
            )));
        }
        for (axis, dim) in [("x", self.room_dim[0]), ("y", self.room_dim[1])] {
            if self.margin < 0.0 || 2.0 * self.margin >= dim {
                return Err(invalid(format!(
                    "margin ({}) leaves no room along {} (dimension {})",
                    self.margin, axis, dim
                )));
            }
        }
        // outermost capsules sit mic_radius beyond the outermost grid positions
        if self.mic_radius > self.margin {
            return Err(invalid(format!(
                "mic_radius ({}) exceeds margin ({}); capsules would lie outside the room",
                self.mic_radius, self.margin
            )));
        }
        if let Some(range) = self.source_range
            && (range.start >= range.end || range.end > self.grid_x * self.grid_y)
        {
            return Err(invalid(format!(
                "source_range {}..{} must be non-empty and within 0..{}",
                range.start,
                range.end,
                self.grid_x * self.grid_y
            )));
        }
        Ok(())
    }
}

// ============================================================================
// DoA evaluation
// ============================================================================

/// Direction-of-arrival evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DoaConfig {
    /// Radius of the circular microphone arrays (m)
    pub mic_radius: f64,
    /// Number of microphones per array
    pub mic_count: usize,
    /// Sample rate of the inference waveforms (Hz)
    pub sample_rate: u32,
    /// FFT size of the STFT
    pub n_fft: usize,
    /// STFT hop; n_fft / 4 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hop_length: Option<usize>,
    /// Coordinate table written by the simulator
    pub points_path: PathBuf,
    /// Ground-truth and network waveforms keyed by "[source, mic]"
    pub inference_archive: PathBuf,
    /// Where the per-key DoA responses are written
    pub output_path: PathBuf,
    /// Algorithms to run, in report order
    pub algorithms: Vec<DoaAlgorithm>,
    /// Number of azimuth grid points over [0, 360)
    pub n_grid: usize,
    /// Frequency range used by the estimators (Hz)
    pub freq_range: [f64; 2],
    /// Number of sources to localize
    pub num_src: usize,
    /// Speed of sound (m/s)
    pub speed_of_sound: f64,
    /// Focusing iterations of CSSM and WAVES
    pub num_iter: usize,
    /// Units of the reported angular errors
    pub error_units: ErrorUnits,
    /// Skip malformed or unresolvable keys with a warning instead of failing
    pub skip_malformed: bool,
}

impl Default for DoaConfig {
    fn default() -> Self {
        Self {
            mic_radius: 0.1,
            mic_count: 4,
            sample_rate: 22050,
            n_fft: 512,
            hop_length: None,
            points_path: PathBuf::from(DEFAULT_POINTS_PATH),
            inference_archive: PathBuf::from(DEFAULT_INFERENCE_ARCHIVE),
            output_path: PathBuf::from(DEFAULT_DOA_OUTPUT),
            algorithms: DoaAlgorithm::all(),
            n_grid: 360,
            freq_range: [500.0, 4000.0],
            num_src: 1,
            speed_of_sound: SPEED_OF_SOUND,
            num_iter: 5,
            error_units: ErrorUnits::Index,
            skip_malformed: false,
        }
    }
}

impl DoaConfig {
    pub fn hop(&self) -> usize {
        self.hop_length.unwrap_or(self.n_fft / 4).max(1)
    }

    /// Angular resolution of the DoA grid in degrees
    pub fn grid_resolution(&self) -> f64 {
        360.0 / self.n_grid as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.mic_count < 2 {
            return Err(invalid(format!(
                "mic_count ({}) must be at least 2 for DoA estimation",
                self.mic_count
            )));
        }
        if self.mic_radius <= 0.0 {
            return Err(invalid(format!(
                "mic_radius ({}) must be positive",
                self.mic_radius
            )));
        }
        if self.n_fft < 2 {
            return Err(invalid(format!("n_fft ({}) must be at least 2", self.n_fft)));
        }
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be positive"));
        }
        if self.algorithms.is_empty() {
            return Err(invalid("at least one DoA algorithm is required"));
        }
        if self.n_grid == 0 {
            return Err(invalid("n_grid must be at least 1"));
        }
        if self.num_src == 0 || self.num_src >= self.mic_count {
            return Err(invalid(format!(
                "num_src ({}) must be in 1..{}",
                self.num_src, self.mic_count
            )));
        }
        let [low, high] = self.freq_range;
        if !(low >= 0.0 && low <= high) {
            return Err(invalid(format!(
                "freq_range [{}, {}] must be ordered and non-negative",
                low, high
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Spectral evaluation
// ============================================================================

/// Spectral loss evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SpectralConfig {
    /// Experiment name; the experiment directory is `<save_loc>/<exp_name>`
    pub exp_name: String,
    /// Save location; `RIRKIT_SAVE_LOC` or `./results` when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_loc: Option<PathBuf>,
    /// Sub directory of the save location holding inference outputs
    pub inference_loc: PathBuf,
    /// File name of the spectral archive
    pub archive_name: String,
    /// Distance between network and ground-truth spectra
    pub metric: SpectralMetric,
    /// Skip keys with missing datasets with a warning instead of failing
    pub skip_missing: bool,
    /// Log progress every N keys
    pub progress_interval: usize,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            exp_name: "default".to_string(),
            save_loc: None,
            inference_loc: PathBuf::from(DEFAULT_INFERENCE_LOC),
            archive_name: DEFAULT_SPECTRAL_ARCHIVE.to_string(),
            metric: SpectralMetric::Mae,
            skip_missing: false,
            progress_interval: 1000,
        }
    }
}

impl SpectralConfig {
    /// `<save_loc>/<exp_name>`
    pub fn exp_dir(&self) -> Result<PathBuf> {
        Ok(get_save_loc(self.save_loc.as_deref())?.join(&self.exp_name))
    }

    /// `<save_loc>/<inference_loc>/<archive_name>`
    pub fn archive_path(&self) -> Result<PathBuf> {
        Ok(get_save_loc(self.save_loc.as_deref())?
            .join(&self.inference_loc)
            .join(&self.archive_name))
    }
}

fn invalid(message: impl Into<String>) -> RirkitError {
    RirkitError::InvalidConfig {
        message: message.into(),
    }
}
