//! RIR dataset generation
//!
//! One simulation pass per grid position: that position holds the source and
//! every other position holds a circular microphone array. The simulator
//! returns one waveform per capsule with the source's own array absent, and
//! [`resolve_channel_offset`] maps a (mic array, channel) pair back into that
//! flat list.

use crate::config::SimulationConfig;
use crate::error::{Result, RirkitError};
use crate::grid::mic_array;
use crate::points::{BoundingBox, CoordinateTable};
use log::{info, warn};
use rirkit_env::ensure_output_dir;
use rirkit_roomsim::{Microphone, Point3D, RoomSimulator};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Index of the first channel of `mic_array_index` in the simulator output of
/// pass `source_index`, or `None` for the source's own position
pub fn resolve_channel_offset(
    source_index: usize,
    mic_array_index: usize,
    channel_count: usize,
) -> Option<usize> {
    match mic_array_index.cmp(&source_index) {
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some((mic_array_index - 1) * channel_count),
        std::cmp::Ordering::Less => Some(mic_array_index * channel_count),
    }
}

/// Identifies one impulse response of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RirKey {
    pub source_index: usize,
    pub mic_array_index: usize,
    /// 1-based channel number
    pub channel: usize,
}

impl RirKey {
    /// `<source>_<mic array>_<channel>.wav`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}.wav",
            self.source_index, self.mic_array_index, self.channel
        )
    }
}

/// Destination of the generated dataset
pub trait RirSink {
    /// Store the coordinate table and room bounding box
    fn write_layout(&mut self, table: &CoordinateTable, bbox: &BoundingBox) -> Result<()>;

    /// Store one impulse response
    fn write_rir(&mut self, key: RirKey, samples: &[f64], sample_rate: u32) -> Result<()>;

    /// Whether `key` was stored by an earlier run
    fn contains(&self, _key: RirKey) -> bool {
        false
    }
}

/// Writes mono 32-bit float WAV files plus the layout files
#[derive(Debug, Clone)]
pub struct WavDirectorySink {
    points_path: PathBuf,
    minmax_path: PathBuf,
    results_dir: PathBuf,
}

impl WavDirectorySink {
    /// Creates every output directory up front
    pub fn new(
        points_path: impl Into<PathBuf>,
        minmax_path: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let sink = Self {
            points_path: points_path.into(),
            minmax_path: minmax_path.into(),
            results_dir: results_dir.into(),
        };
        for path in [&sink.points_path, &sink.minmax_path, &sink.results_dir] {
            ensure_output_dir(path)?;
        }
        Ok(sink)
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        Self::new(
            &config.points_path,
            &config.minmax_path,
            &config.results_dir,
        )
    }

    pub fn rir_path(&self, key: RirKey) -> PathBuf {
        self.results_dir.join(key.file_name())
    }
}

impl RirSink for WavDirectorySink {
    fn write_layout(&mut self, table: &CoordinateTable, bbox: &BoundingBox) -> Result<()> {
        table.write(&self.points_path)?;
        bbox.write(&self.minmax_path)
    }

    fn write_rir(&mut self, key: RirKey, samples: &[f64], sample_rate: u32) -> Result<()> {
        write_wav(&self.rir_path(key), samples, sample_rate)
    }

    /// Only files with a readable header and at least one sample count
    fn contains(&self, key: RirKey) -> bool {
        hound::WavReader::open(self.rir_path(key)).is_ok_and(|reader| reader.len() > 0)
    }
}

/// Keeps everything in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub layout: Option<(CoordinateTable, BoundingBox)>,
    pub layout_writes: usize,
    pub records: BTreeMap<RirKey, Vec<f64>>,
}

impl RirSink for MemorySink {
    fn write_layout(&mut self, table: &CoordinateTable, bbox: &BoundingBox) -> Result<()> {
        self.layout = Some((table.clone(), *bbox));
        self.layout_writes += 1;
        Ok(())
    }

    fn write_rir(&mut self, key: RirKey, samples: &[f64], _sample_rate: u32) -> Result<()> {
        self.records.insert(key, samples.to_vec());
        Ok(())
    }

    fn contains(&self, key: RirKey) -> bool {
        self.records.contains_key(&key)
    }
}

/// Save a waveform as a mono 32-bit float WAV file
///
/// The file is written under a `.part` name and renamed once finalized, so an
/// interrupted run never leaves a truncated file under the final name.
pub fn write_wav(path: &Path, samples: &[f64], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let partial = partial_path(path);
    let mut writer = hound::WavWriter::create(&partial, spec)?;
    for &sample in samples {
        writer.write_sample(sample as f32)?;
    }
    writer.finalize()?;
    std::fs::rename(&partial, path)?;

    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

/// Totals of a simulation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub sources_simulated: usize,
    pub sources_skipped: usize,
    pub files_written: usize,
    pub compute_time: Duration,
    pub write_time: Duration,
}

/// Keys produced by the pass of `source_index`
pub fn pass_keys(
    source_index: usize,
    num_positions: usize,
    channel_count: usize,
) -> impl Iterator<Item = RirKey> {
    (0..num_positions)
        .filter(move |&mic_array_index| mic_array_index != source_index)
        .flat_map(move |mic_array_index| {
            (1..=channel_count).map(move |channel| RirKey {
                source_index,
                mic_array_index,
                channel,
            })
        })
}

/// Microphones of every array except the one at `source_index`, in grid order
pub fn pass_microphones(
    positions: &[Point3D],
    source_index: usize,
    config: &SimulationConfig,
) -> Vec<Microphone> {
    positions
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != source_index)
        .flat_map(|(_, center)| {
            mic_array(center, config.mic_count, config.mic_radius, config.mic_directivity)
        })
        .collect()
}

/// Generate the dataset described by `config` into `sink`
///
/// The configuration is validated before anything is written. The coordinate
/// table and bounding box are written once, on the first pass of the run.
pub fn run_simulation(
    config: &SimulationConfig,
    simulator: &dyn RoomSimulator,
    sink: &mut dyn RirSink,
) -> Result<SimulationReport> {
    config.validate()?;
    let positions = config.grid().positions()?;
    let room = config.room()?;
    let num_positions = positions.len();
    let channel_count = config.mic_count;
    let sources = config.sources();
    let total = sources.len();
    if let Some(range) = config.source_range
        && range.end > num_positions
    {
        warn!(
            "source range {}..{} clipped to the {} grid positions",
            range.start,
            range.end,
            num_positions
        );
    }

    info!(
        "simulating {} sources in a {:?} m room (absorption {:.4}, max order {}, Sabine RT60 {:.3} s)",
        total,
        room.dimensions(),
        room.absorption,
        room.max_order,
        room.rt60_sabine()
    );

    let mut report = SimulationReport::default();
    for (done, source_index) in sources.enumerate() {
        if done == 0 {
            sink.write_layout(
                &CoordinateTable::from_positions(&positions),
                &BoundingBox::for_room(config.room_dim),
            )?;
        }

        if config.skip_existing
            && pass_keys(source_index, num_positions, channel_count).all(|key| sink.contains(key))
        {
            info!("source_index {} already on disk, skipping", source_index);
            report.sources_skipped += 1;
            continue;
        }

        let mics = pass_microphones(&positions, source_index, config);

        let before_compute = Instant::now();
        let rirs = simulator.compute_rir(&room, &positions[source_index], &mics)?;
        let compute_time = before_compute.elapsed();

        if rirs.len() != mics.len() {
            return Err(RirkitError::ShapeMismatch {
                name: format!("source {}", source_index),
                message: format!(
                    "simulator returned {} responses for {} microphones",
                    rirs.len(),
                    mics.len()
                ),
            });
        }

        let before_write = Instant::now();
        for key in pass_keys(source_index, num_positions, channel_count) {
            let Some(offset) =
                resolve_channel_offset(source_index, key.mic_array_index, channel_count)
            else {
                continue;
            };
            sink.write_rir(key, &rirs[offset + key.channel - 1], config.sample_rate)?;
            report.files_written += 1;
        }
        let write_time = before_write.elapsed();

        report.sources_simulated += 1;
        report.compute_time += compute_time;
        report.write_time += write_time;

        info!(
            "compute time: {:.2}s, write time: {:.2}s",
            compute_time.as_secs_f64(),
            write_time.as_secs_f64()
        );
        info!(
            "source_index {} ({:.2}) done!",
            source_index,
            (done + 1) as f64 / total as f64
        );
        info!(
            "compute time: {:.2} minutes now, write time: {:.2} minutes now",
            report.compute_time.as_secs_f64() / 60.0,
            report.write_time.as_secs_f64() / 60.0
        );
    }

    info!(
        "compute time: {:.2} minutes, write time: {:.2} minutes",
        report.compute_time.as_secs_f64() / 60.0,
        report.write_time.as_secs_f64() / 60.0
    );
    Ok(report)
}
