//! Direction of arrival error of predicted audio
//!
//! For every pair of the inference archive the true bearing from the
//! microphone array to the source is computed from the coordinate table. Each
//! algorithm then estimates the bearing twice, from the ground-truth and from
//! the predicted waveforms, and three absolute errors are accumulated:
//! ground truth vs true bearing, prediction vs true bearing and prediction vs
//! ground truth.
//!
//! Estimates are azimuth grid indices. With [`ErrorUnits::Index`] they are
//! compared with the bearing in degrees as is, which only matches when the
//! grid has one point per degree; [`ErrorUnits::Degrees`] converts them first.

use crate::archive::{InferenceRecord, PairKey, read_inference_archive, write_json};
use crate::cli::ErrorUnits;
use crate::config::DoaConfig;
use crate::doa::{DoaAlgorithm, DoaBackend, DoaResponse};
use crate::error::{Result, RirkitError};
use crate::grid::circular_2d_array;
use crate::points::CoordinateTable;
use crate::stft::SpectralTransform;
use log::{info, warn};
use rirkit_env::ensure_output_dir;
use serde::Serialize;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Bearing of `source` seen from `mic`, in degrees within [0, 360)
pub fn true_bearing_degrees(source: [f64; 2], mic: [f64; 2]) -> f64 {
    let mut radian = (source[1] - mic[1]).atan2(source[0] - mic[0]);
    if radian < 0.0 {
        radian += 2.0 * PI;
    }
    let degrees = radian.to_degrees();
    // -0.0 and values rounding up to a full turn
    if degrees >= 360.0 { 0.0 } else { degrees.abs() }
}

/// Absolute error series of one algorithm
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorSeries {
    pub gt: Vec<f64>,
    pub net: Vec<f64>,
    pub gt_net: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean errors of one algorithm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmSummary {
    pub algorithm: DoaAlgorithm,
    pub gt_mean: Option<f64>,
    pub net_mean: Option<f64>,
    pub gt_net_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoaReport {
    pub error_units: ErrorUnits,
    pub summaries: Vec<AlgorithmSummary>,
    pub keys_evaluated: usize,
    pub keys_skipped: usize,
}

/// Responses of one algorithm keyed by archive key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlgorithmValues {
    pub gt: BTreeMap<String, DoaResponse>,
    pub net: BTreeMap<String, DoaResponse>,
}

/// Every response of a run: `{algorithm: {"gt": {key: ...}, "net": {key: ...}}}`
pub type DoaValues = BTreeMap<DoaAlgorithm, AlgorithmValues>;

struct PairOutcome {
    algorithm: DoaAlgorithm,
    gt: DoaResponse,
    net: DoaResponse,
    errors: [f64; 3],
}

/// Accumulates DoA errors key by key
pub struct DoaEvaluator<'a> {
    config: DoaConfig,
    table: CoordinateTable,
    backend: &'a dyn DoaBackend,
    transform: &'a dyn SpectralTransform,
    series: BTreeMap<DoaAlgorithm, ErrorSeries>,
    values: DoaValues,
    evaluated: usize,
    skipped: usize,
}

impl<'a> DoaEvaluator<'a> {
    pub fn new(
        config: DoaConfig,
        table: CoordinateTable,
        backend: &'a dyn DoaBackend,
        transform: &'a dyn SpectralTransform,
    ) -> Result<Self> {
        config.validate()?;
        let series = config
            .algorithms
            .iter()
            .map(|&a| (a, ErrorSeries::default()))
            .collect();
        let values = config
            .algorithms
            .iter()
            .map(|&a| (a, AlgorithmValues::default()))
            .collect();
        Ok(Self {
            config,
            table,
            backend,
            transform,
            series,
            values,
            evaluated: 0,
            skipped: 0,
        })
    }

    fn position(&self, key: &str, index: usize) -> Result<[f64; 2]> {
        self.table
            .get(index)
            .map(|p| [p.x, p.y])
            .ok_or_else(|| RirkitError::IndexOutOfRange {
                key: key.to_string(),
                index,
                len: self.table.len(),
            })
    }

    fn grid_index(&self, response: &DoaResponse, key: &str) -> Result<usize> {
        response.argmax().ok_or_else(|| RirkitError::ShapeMismatch {
            name: key.to_string(),
            message: "estimator returned an empty response".to_string(),
        })
    }

    fn evaluate_pair(&self, key: &str, record: &InferenceRecord) -> Result<Vec<PairOutcome>> {
        let pair = PairKey::parse(key)?;
        let mic = self.position(key, pair.mic_array_index)?;
        let source = self.position(key, pair.source_index)?;
        let bearing = true_bearing_degrees(source, mic);
        let mics = circular_2d_array(mic, self.config.mic_count, 0.0, self.config.mic_radius);

        let gt_spec = self.transform.transform(record.gt_wav.to_array("gt_wav")?.view());
        let net_spec = self.transform.transform(record.net_wav.to_array("net_wav")?.view());

        let scale = match self.config.error_units {
            ErrorUnits::Index => 1.0,
            ErrorUnits::Degrees => self.config.grid_resolution(),
        };

        self.config
            .algorithms
            .iter()
            .map(|&algorithm| {
                let estimator = self.backend.estimator(algorithm, &mics)?;
                let gt = estimator.locate(gt_spec.view())?;
                let net = estimator.locate(net_spec.view())?;
                let gt_estimate = self.grid_index(&gt, key)? as f64 * scale;
                let net_estimate = self.grid_index(&net, key)? as f64 * scale;
                Ok(PairOutcome {
                    algorithm,
                    gt,
                    net,
                    errors: [
                        (gt_estimate - bearing).abs(),
                        (net_estimate - bearing).abs(),
                        (net_estimate - gt_estimate).abs(),
                    ],
                })
            })
            .collect()
    }

    /// Evaluate one archive entry
    ///
    /// Nothing is accumulated for a key that fails. Key errors are skipped
    /// with a warning when `skip_malformed` is set and returned otherwise.
    pub fn process(&mut self, key: &str, record: &InferenceRecord) -> Result<()> {
        let outcomes = match self.evaluate_pair(key, record) {
            Ok(outcomes) => outcomes,
            Err(err) if self.config.skip_malformed && err.is_key_error() => {
                warn!("skipping {}: {}", key, err);
                self.skipped += 1;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        for outcome in outcomes {
            let series = self.series.entry(outcome.algorithm).or_default();
            series.gt.push(outcome.errors[0]);
            series.net.push(outcome.errors[1]);
            series.gt_net.push(outcome.errors[2]);
            let values = self.values.entry(outcome.algorithm).or_default();
            values.gt.insert(key.to_string(), outcome.gt);
            values.net.insert(key.to_string(), outcome.net);
        }
        self.evaluated += 1;
        Ok(())
    }

    pub fn series(&self, algorithm: DoaAlgorithm) -> Option<&ErrorSeries> {
        self.series.get(&algorithm)
    }

    /// Means per algorithm, in configured order, and every response
    pub fn finish(self) -> (DoaReport, DoaValues) {
        let summaries = self
            .config
            .algorithms
            .iter()
            .map(|&algorithm| {
                let series = self.series.get(&algorithm).cloned().unwrap_or_default();
                AlgorithmSummary {
                    algorithm,
                    gt_mean: mean(&series.gt),
                    net_mean: mean(&series.net),
                    gt_net_mean: mean(&series.gt_net),
                }
            })
            .collect();
        (
            DoaReport {
                error_units: self.config.error_units,
                summaries,
                keys_evaluated: self.evaluated,
                keys_skipped: self.skipped,
            },
            self.values,
        )
    }
}

/// Evaluate the inference archive of `config` and write the responses to
/// `config.output_path`
pub fn run_doa_evaluation(
    config: &DoaConfig,
    backend: &dyn DoaBackend,
    transform: &dyn SpectralTransform,
) -> Result<DoaReport> {
    config.validate()?;
    let table = CoordinateTable::read(&config.points_path)?;
    info!(
        "loaded {} positions from {}",
        table.len(),
        config.points_path.display()
    );
    ensure_output_dir(&config.output_path)?;

    let mut evaluator = DoaEvaluator::new(config.clone(), table, backend, transform)?;
    let count = read_inference_archive(&config.inference_archive, |key, record| {
        evaluator.process(&key, &record)
    })?;
    info!(
        "read {} records from {}",
        count,
        config.inference_archive.display()
    );

    let (report, values) = evaluator.finish();
    write_json(&config.output_path, &values)?;
    info!("DoA responses written to {}", config.output_path.display());
    Ok(report)
}
