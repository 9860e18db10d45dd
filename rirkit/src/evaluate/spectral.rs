//! Spectral loss between network and ground-truth spectra

use crate::cli::SpectralMetric;
use crate::config::SpectralConfig;
use crate::error::{Result, RirkitError};
use crate::spectral_archive::{
    GT_MAG, GT_PHASE, MEAN, OUT_MAG, OUT_PHASE, PHASE_STD, STD, SpectralStore, unique_base_keys,
};
use log::{info, warn};
use ndarray::{ArrayD, Axis, Slice};
use serde::Serialize;

/// Scalar distance between two spectra of identical shape
pub trait SpectralDistance {
    fn name(&self) -> &'static str;

    fn distance(&self, a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanAbsoluteError;

#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

fn mean_of(a: &ArrayD<f64>, b: &ArrayD<f64>, f: impl Fn(f64) -> f64) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(RirkitError::ShapeMismatch {
            name: "spectra".to_string(),
            message: format!("{:?} vs {:?}", a.shape(), b.shape()),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a.iter().zip(b.iter()).map(|(x, y)| f(x - y)).sum();
    Ok(sum / a.len() as f64)
}

impl SpectralDistance for MeanAbsoluteError {
    fn name(&self) -> &'static str {
        "mae"
    }

    fn distance(&self, a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<f64> {
        mean_of(a, b, f64::abs)
    }
}

impl SpectralDistance for MeanSquaredError {
    fn name(&self) -> &'static str {
        "mse"
    }

    fn distance(&self, a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<f64> {
        mean_of(a, b, |d| d * d)
    }
}

pub fn distance_for(metric: SpectralMetric) -> Box<dyn SpectralDistance> {
    match metric {
        SpectralMetric::Mae => Box::new(MeanAbsoluteError),
        SpectralMetric::Mse => Box::new(MeanSquaredError),
    }
}

/// Shape of `a op b` under NumPy broadcasting rules
fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let n = a.len().max(b.len());
    let dim = |s: &[usize], i: usize| {
        let offset = n - s.len();
        if i < offset { 1 } else { s[i - offset] }
    };
    (0..n)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (x, y) if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

fn check_broadcast(name: &str, a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<()> {
    broadcast_shape(a.shape(), b.shape())
        .map(|_| ())
        .ok_or_else(|| RirkitError::ShapeMismatch {
            name: name.to_string(),
            message: format!("cannot broadcast {:?} with {:?}", a.shape(), b.shape()),
        })
}

/// Keep the first `len` entries of the last axis
fn truncate_last_axis(array: &ArrayD<f64>, len: usize) -> ArrayD<f64> {
    match array.ndim() {
        0 => array.clone(),
        ndim => {
            let axis = Axis(ndim - 1);
            let end = len.min(array.len_of(axis));
            array.slice_axis(axis, Slice::from(0..end)).to_owned()
        }
    }
}

/// Global de-normalization statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralStats {
    pub mean: ArrayD<f64>,
    pub std: ArrayD<f64>,
    pub phase_std: ArrayD<f64>,
}

impl SpectralStats {
    pub fn read(store: &mut dyn SpectralStore) -> Result<Self> {
        Ok(Self {
            mean: store.read(MEAN)?,
            std: store.read(STD)?,
            phase_std: store.read(PHASE_STD)?,
        })
    }

    /// `(value * std + mean)[0]`, statistics truncated to the spectral length
    pub fn denormalize_magnitude(&self, name: &str, value: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        let len = value.shape().last().copied().unwrap_or(1);
        let std = truncate_last_axis(&self.std, len);
        let mean = truncate_last_axis(&self.mean, len);
        check_broadcast(name, value, &std)?;
        let scaled = value * &std;
        check_broadcast(name, &scaled, &mean)?;
        let restored = &scaled + &mean;
        if restored.ndim() == 0 || restored.len_of(Axis(0)) == 0 {
            return Err(RirkitError::ShapeMismatch {
                name: name.to_string(),
                message: format!("no batch element in shape {:?}", restored.shape()),
            });
        }
        Ok(restored.index_axis(Axis(0), 0).to_owned())
    }

    /// `value * phase_std`; a longer trailing axis of `phase_std` is truncated
    pub fn denormalize_phase(&self, name: &str, value: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        let len = value.shape().last().copied().unwrap_or(1);
        let phase_std = if self.phase_std.ndim() > 0
            && self.phase_std.shape().last().copied().unwrap_or(0) > len
        {
            truncate_last_axis(&self.phase_std, len)
        } else {
            self.phase_std.clone()
        };
        check_broadcast(name, value, &phase_std)?;
        Ok(value * &phase_std)
    }
}

/// Mean spectral losses of a run; means are absent when no key was evaluated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralReport {
    pub metric: &'static str,
    pub magnitude_loss: Option<f64>,
    pub phase_loss: Option<f64>,
    pub keys_evaluated: usize,
    pub keys_skipped: usize,
}

/// Magnitude and phase distance of one pair
pub fn evaluate_key(
    store: &mut dyn SpectralStore,
    stats: &SpectralStats,
    distance: &dyn SpectralDistance,
    key: &str,
) -> Result<(f64, f64)> {
    let out_mag = store.read(&format!("{key}{OUT_MAG}"))?;
    let gt_mag = store.read(&format!("{key}{GT_MAG}"))?;
    let out_phase = store.read(&format!("{key}{OUT_PHASE}"))?;
    let gt_phase = store.read(&format!("{key}{GT_PHASE}"))?;

    let phase_loss = distance.distance(
        &stats.denormalize_phase(key, &out_phase)?,
        &stats.denormalize_phase(key, &gt_phase)?,
    )?;
    let magnitude_loss = distance.distance(
        &stats.denormalize_magnitude(key, &out_mag)?,
        &stats.denormalize_magnitude(key, &gt_mag)?,
    )?;
    Ok((magnitude_loss, phase_loss))
}

/// Mean magnitude and phase distance over every pair of `store`
pub fn evaluate_spectral(
    store: &mut dyn SpectralStore,
    distance: &dyn SpectralDistance,
    config: &SpectralConfig,
) -> Result<SpectralReport> {
    let stats = SpectralStats::read(store)?;
    let keys = unique_base_keys(store.names());
    info!("evaluating {} keys with {}", keys.len(), distance.name());

    let (mut magnitude, mut phase) = (0.0, 0.0);
    let (mut evaluated, mut skipped) = (0, 0);
    let interval = config.progress_interval.max(1);
    for (offset, key) in keys.iter().enumerate() {
        if (offset + 1).is_multiple_of(interval) {
            info!("{} / {} keys", offset + 1, keys.len());
        }
        match evaluate_key(store, &stats, distance, key) {
            Ok((m, p)) => {
                magnitude += m;
                phase += p;
                evaluated += 1;
            }
            Err(err) if config.skip_missing && err.is_key_error() => {
                warn!("skipping {}: {}", key, err);
                skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    let mean = |total: f64| (evaluated > 0).then(|| total / evaluated as f64);
    Ok(SpectralReport {
        metric: distance.name(),
        magnitude_loss: mean(magnitude),
        phase_loss: mean(phase),
        keys_evaluated: evaluated,
        keys_skipped: skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn array(shape: &[usize], f: impl Fn(usize) -> f64) -> ArrayD<f64> {
        let len = shape.iter().product();
        Array::from_shape_vec(IxDyn(shape), (0..len).map(f).collect()).expect("shape matches")
    }

    fn stats() -> SpectralStats {
        SpectralStats {
            mean: array(&[1, 2, 6], |i| i as f64 * 0.1),
            std: array(&[1, 2, 6], |i| 1.0 + i as f64),
            phase_std: array(&[1, 2, 1], |i| 2.0 + i as f64),
        }
    }

    #[test]
    fn test_denormalize_inverts_normalization() {
        let stats = stats();
        let original = array(&[1, 2, 4], |i| (i as f64).sin() * 3.0);
        let mean = truncate_last_axis(&stats.mean, 4);
        let std = truncate_last_axis(&stats.std, 4);
        let normalized = (&original - &mean) / &std;
        let restored = stats
            .denormalize_magnitude("[0, 1]", &normalized)
            .expect("shapes broadcast");
        assert_eq!(restored.shape(), &[2, 4]);
        for (r, o) in restored.iter().zip(original.iter()) {
            assert!((r - o).abs() < 1e-12);
        }
    }

    #[test]
    fn test_phase_is_scaled_per_bin() {
        let stats = stats();
        let phase = array(&[1, 2, 3], |_| 1.0);
        let scaled = stats.denormalize_phase("[0, 1]", &phase).expect("broadcast");
        assert_eq!(scaled.shape(), &[1, 2, 3]);
        assert_eq!(scaled[[0, 0, 2]], 2.0);
        assert_eq!(scaled[[0, 1, 0]], 3.0);
    }

    #[test]
    fn test_incompatible_shapes_are_rejected() {
        let stats = stats();
        let value = array(&[1, 3, 4], |_| 0.0);
        assert!(matches!(
            stats.denormalize_magnitude("[0, 1]", &value),
            Err(RirkitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_distances() {
        let a = array(&[2, 2], |i| i as f64);
        let b = array(&[2, 2], |_| 1.0);
        assert!((MeanAbsoluteError.distance(&a, &b).expect("same shape") - 1.0).abs() < 1e-12);
        assert!((MeanSquaredError.distance(&a, &b).expect("same shape") - 1.5).abs() < 1e-12);
        assert!(MeanAbsoluteError.distance(&a, &array(&[4], |_| 0.0)).is_err());
    }

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(broadcast_shape(&[1, 2, 4], &[1, 2, 1]), Some(vec![1, 2, 4]));
        assert_eq!(broadcast_shape(&[2, 4], &[1, 2, 4]), Some(vec![1, 2, 4]));
        assert_eq!(broadcast_shape(&[3, 4], &[2, 4]), None);
    }
}
