//! Spectral eval - Spectral loss of predicted magnitude and phase
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
use rirkit::SpectralConfig;
use rirkit::cli::{SpectralMetric, load_config};
use rirkit::evaluate::{distance_for, evaluate_spectral};
use rirkit::spectral_archive::NpzSpectralArchive;
use std::path::PathBuf;

/// Mean spectral distance between network and ground-truth spectra
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Spectral configuration JSON file (defaults when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Experiment name
    #[arg(long)]
    exp_name: Option<String>,

    /// Save location (overrides RIRKIT_SAVE_LOC)
    #[arg(long)]
    save_loc: Option<PathBuf>,

    /// Sub directory of the save location holding inference outputs
    #[arg(long)]
    inference_loc: Option<PathBuf>,

    /// File name of the spectral archive
    #[arg(long)]
    archive_name: Option<String>,

    /// Spectral distance
    #[arg(long, value_enum)]
    metric: Option<SpectralMetric>,

    /// Skip keys with missing datasets instead of failing
    #[arg(long)]
    skip_missing: bool,

    /// Verbose output (deprecated, use RUST_LOG env var)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut SpectralConfig) {
        if let Some(v) = &self.exp_name {
            config.exp_name = v.clone();
        }
        if let Some(v) = &self.save_loc {
            config.save_loc = Some(v.clone());
        }
        if let Some(v) = &self.inference_loc {
            config.inference_loc = v.clone();
        }
        if let Some(v) = &self.archive_name {
            config.archive_name = v.clone();
        }
        if let Some(v) = self.metric {
            config.metric = v;
        }
        config.skip_missing |= self.skip_missing;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.verbose {
        warn!("The --verbose flag is deprecated. Use RUST_LOG=debug instead.");
    }

    let mut config: SpectralConfig = load_config(args.config.as_deref())
        .with_context(|| format!("Failed to load configuration {:?}", args.config))?;
    args.apply(&mut config);

    info!("experiment directory: {:?}", config.exp_dir()?);
    let archive_path = config.archive_path()?;
    info!("reading spectral archive {:?}", archive_path);

    let mut archive = NpzSpectralArchive::open(&archive_path)
        .with_context(|| format!("Failed to open spectral archive {:?}", archive_path))?;
    let distance = distance_for(config.metric);
    let report = evaluate_spectral(&mut archive, distance.as_ref(), &config)
        .context("Spectral evaluation failed")?;

    match (report.magnitude_loss, report.phase_loss) {
        (Some(magnitude), Some(phase)) => {
            println!("the spectral loss is {}", magnitude);
            println!("the spectral phase loss is {}", phase);
        }
        _ => warn!("no key was evaluated"),
    }
    info!(
        "{} keys evaluated, {} skipped ({})",
        report.keys_evaluated, report.keys_skipped, report.metric
    );
    Ok(())
}
