//! DoA eval - Direction of arrival error of predicted room impulse responses
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
use log::warn;
use rirkit::DoaConfig;
use rirkit::cli::{ErrorUnits, load_config};
use rirkit::doa::{DoaAlgorithm, DoaSettings, SubspaceBackend};
use rirkit::evaluate::{AlgorithmSummary, DoaReport, run_doa_evaluation};
use rirkit::stft::Stft;
use std::path::PathBuf;

/// Compare DoA estimates of ground-truth and predicted audio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// DoA configuration JSON file (defaults when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inference archive with ground-truth and network waveforms
    #[arg(long)]
    inference_archive: Option<PathBuf>,

    /// Coordinate table written by rir_simulate
    #[arg(long)]
    points_path: Option<PathBuf>,

    /// Output JSON file receiving every DoA response
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Algorithms to run (MUSIC, NormMUSIC, SRP, CSSM, WAVES, TOPS, FRIDA)
    #[arg(long, value_delimiter = ',')]
    algorithms: Vec<DoaAlgorithm>,

    /// Sample rate of the inference waveforms
    #[arg(long)]
    sample_rate: Option<u32>,

    /// FFT size of the STFT
    #[arg(long)]
    n_fft: Option<usize>,

    /// Number of azimuth grid points over 360 degrees
    #[arg(long)]
    n_grid: Option<usize>,

    /// Units of the reported angular errors
    #[arg(long, value_enum)]
    error_units: Option<ErrorUnits>,

    /// Skip malformed or unresolvable keys instead of failing
    #[arg(long)]
    skip_malformed: bool,

    /// Verbose output (deprecated, use RUST_LOG env var)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut DoaConfig) {
        if let Some(v) = &self.inference_archive {
            config.inference_archive = v.clone();
        }
        if let Some(v) = &self.points_path {
            config.points_path = v.clone();
        }
        if let Some(v) = &self.output {
            config.output_path = v.clone();
        }
        if !self.algorithms.is_empty() {
            config.algorithms = self.algorithms.clone();
        }
        if let Some(v) = self.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = self.n_fft {
            config.n_fft = v;
        }
        if let Some(v) = self.n_grid {
            config.n_grid = v;
        }
        if let Some(v) = self.error_units {
            config.error_units = v;
        }
        config.skip_malformed |= self.skip_malformed;
    }
}

fn format_means(report: &DoaReport, pick: impl Fn(&AlgorithmSummary) -> Option<f64>) -> String {
    let entries: Vec<String> = report
        .summaries
        .iter()
        .map(|s| match pick(s) {
            Some(v) => format!("'{}': {:.4}", s.algorithm, v),
            None => format!("'{}': nan", s.algorithm),
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.verbose {
        warn!("The --verbose flag is deprecated. Use RUST_LOG=debug instead.");
    }

    let mut config: DoaConfig = load_config(args.config.as_deref())
        .with_context(|| format!("Failed to load configuration {:?}", args.config))?;
    args.apply(&mut config);
    config.validate().context("Invalid DoA configuration")?;

    let backend = SubspaceBackend::new(DoaSettings::from(&config));
    let transform = Stft::new(config.n_fft, config.hop());
    let report = run_doa_evaluation(&config, &backend, &transform).with_context(|| {
        format!(
            "DoA evaluation of {:?} failed",
            config.inference_archive
        )
    })?;

    println!("degree_diff_gt_mean");
    println!("{}", format_means(&report, |s| s.gt_mean));
    println!("degree_diff_net_mean");
    println!("{}", format_means(&report, |s| s.net_mean));
    println!("degree_diff_gt_net_mean");
    println!("{}", format_means(&report, |s| s.gt_net_mean));
    println!(
        "{} keys evaluated, {} skipped (errors in {} units)",
        report.keys_evaluated, report.keys_skipped, report.error_units
    );
    Ok(())
}
