//! RIR simulate - Render the room impulse response dataset
//!
//! Copyright (C) 2025 Pierre Aubert pierre(at)spinorama(dot)org
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use rirkit::cli::load_config;
use rirkit::dataset::{WavDirectorySink, run_simulation};
use rirkit::{ImageSourceSimulator, SimulationConfig, SourceRange};
use schemars::schema_for;
use std::path::PathBuf;

/// Render one impulse response per source, microphone array and channel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulation configuration JSON file (defaults when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of grid positions along x
    #[arg(long)]
    grid_x: Option<usize>,

    /// Number of grid positions along y
    #[arg(long)]
    grid_y: Option<usize>,

    /// Target reverberation time in seconds
    #[arg(long)]
    rt60: Option<f64>,

    /// Room width, depth and height in meters
    #[arg(long, num_args = 3, value_names = ["WIDTH", "DEPTH", "HEIGHT"])]
    room_dim: Option<Vec<f64>>,

    /// Sample rate of the impulse responses
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Reflection order, derived from the RT60 when absent
    #[arg(long)]
    max_order: Option<usize>,

    /// Use outward facing cardioid capsules
    #[arg(long)]
    mic_directivity: bool,

    /// Coordinate table output path
    #[arg(long)]
    points_path: Option<PathBuf>,

    /// Bounding box output path
    #[arg(long)]
    minmax_path: Option<PathBuf>,

    /// Directory receiving the WAV files
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Skip sources whose files already exist
    #[arg(long)]
    skip_existing: bool,

    /// First source index to simulate
    #[arg(long, requires = "source_end")]
    source_start: Option<usize>,

    /// Source index to stop before
    #[arg(long, requires = "source_start")]
    source_end: Option<usize>,

    /// Verbose output (deprecated, use RUST_LOG env var)
    #[arg(short, long)]
    verbose: bool,

    /// Dump JSON schema of the simulation configuration
    #[arg(long)]
    schema: bool,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(v) = self.grid_x {
            config.grid_x = v;
        }
        if let Some(v) = self.grid_y {
            config.grid_y = v;
        }
        if let Some(v) = self.rt60 {
            config.rt60 = v;
        }
        if let Some([w, d, h]) = self.room_dim.as_deref() {
            config.room_dim = [*w, *d, *h];
        }
        if let Some(v) = self.sample_rate {
            config.sample_rate = v;
        }
        if self.max_order.is_some() {
            config.max_order = self.max_order;
        }
        if let Some(v) = &self.points_path {
            config.points_path = v.clone();
        }
        if let Some(v) = &self.minmax_path {
            config.minmax_path = v.clone();
        }
        if let Some(v) = &self.results_dir {
            config.results_dir = v.clone();
        }
        if let (Some(start), Some(end)) = (self.source_start, self.source_end) {
            config.source_range = Some(SourceRange { start, end });
        }
        config.mic_directivity |= self.mic_directivity;
        config.skip_existing |= self.skip_existing;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.schema {
        let schema = schema_for!(SimulationConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    if args.verbose {
        warn!("The --verbose flag is deprecated. Use RUST_LOG=debug instead.");
    }

    let mut config: SimulationConfig = load_config(args.config.as_deref())
        .with_context(|| format!("Failed to load configuration {:?}", args.config))?;
    args.apply(&mut config);
    config
        .validate()
        .context("Invalid simulation configuration")?;

    let simulator =
        ImageSourceSimulator::new(config.speed_of_sound, config.fractional_delay_length);
    let mut sink = WavDirectorySink::from_config(&config)
        .context("Failed to prepare output directories")?;

    info!(
        "writing {} to {:?}",
        if config.mic_directivity { "cardioid RIRs" } else { "RIRs" },
        config.results_dir
    );
    let report = run_simulation(&config, &simulator, &mut sink).context("Simulation failed")?;

    info!(
        "{} sources simulated, {} skipped, {} files written",
        report.sources_simulated,
        report.sources_skipped,
        report.files_written
    );
    info!("all done!");
    Ok(())
}
