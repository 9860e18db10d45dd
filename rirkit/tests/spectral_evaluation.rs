use ndarray::{Array, ArrayD, IxDyn};
use ndarray_npy::NpzWriter;
use rirkit::cli::SpectralMetric;
use rirkit::evaluate::{MeanAbsoluteError, MeanSquaredError, distance_for, evaluate_spectral};
use rirkit::spectral_archive::NpzSpectralArchive;
use rirkit::{RirkitError, SpectralConfig};
use std::collections::BTreeMap;
use std::fs::File;
use tempfile::TempDir;

fn array(shape: &[usize], f: impl Fn(usize) -> f64) -> ArrayD<f64> {
    let len = shape.iter().product();
    Array::from_shape_vec(IxDyn(shape), (0..len).map(f).collect()).expect("shape matches")
}

/// Statistics over 6 bins; the spectra below only use the first 4
fn stats() -> BTreeMap<String, ArrayD<f64>> {
    let mut store = BTreeMap::new();
    store.insert("mean".to_string(), array(&[1, 2, 6], |i| i as f64));
    store.insert("std".to_string(), array(&[1, 2, 6], |i| 1.0 + i as f64));
    store.insert("phase_std".to_string(), array(&[1, 2, 1], |i| 2.0 + i as f64));
    store
}

/// Prediction off by one normalized unit in magnitude and half a unit in phase
fn add_shifted_pair(store: &mut BTreeMap<String, ArrayD<f64>>, key: &str) {
    let gt = array(&[1, 2, 4], |i| i as f64 * 0.25);
    store.insert(format!("{key}_gt_mag"), gt.clone());
    store.insert(format!("{key}_out_mag"), &gt + 1.0);
    store.insert(format!("{key}_gt_phase"), gt.clone());
    store.insert(format!("{key}_out_phase"), &gt + 0.5);
}

fn add_exact_pair(store: &mut BTreeMap<String, ArrayD<f64>>, key: &str) {
    let gt = array(&[1, 2, 4], |i| 1.0 - i as f64 * 0.125);
    for suffix in ["_gt_mag", "_out_mag", "_gt_phase", "_out_phase"] {
        store.insert(format!("{key}{suffix}"), gt.clone());
    }
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("loss present");
    assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
}

#[test]
fn test_shifted_prediction_is_scaled_by_std() {
    let mut store = stats();
    add_shifted_pair(&mut store, "[0, 1]");
    let report = evaluate_spectral(&mut store, &MeanAbsoluteError, &SpectralConfig::default())
        .expect("evaluation runs");
    // std of the kept bins: 1 2 3 4 / 7 8 9 10
    assert_close(report.magnitude_loss, 5.5);
    // phase_std per row: 2 / 3
    assert_close(report.phase_loss, 1.25);
    assert_eq!(report.keys_evaluated, 1);
    assert_eq!(report.metric, "mae");
}

#[test]
fn test_losses_are_averaged_over_keys() {
    let mut store = stats();
    add_shifted_pair(&mut store, "[0, 1]");
    add_exact_pair(&mut store, "[2, 0]");
    let report = evaluate_spectral(&mut store, &MeanSquaredError, &SpectralConfig::default())
        .expect("evaluation runs");
    assert_eq!(report.keys_evaluated, 2);
    assert_close(report.magnitude_loss, 40.5 / 2.0);
    assert_close(report.phase_loss, 1.625 / 2.0);
}

#[test]
fn test_missing_dataset_fails_unless_skipped() {
    let mut store = stats();
    add_exact_pair(&mut store, "[0, 1]");
    store.insert("[3, 3]_gt_mag".to_string(), array(&[1, 2, 4], |_| 0.0));

    let err = evaluate_spectral(&mut store, &MeanAbsoluteError, &SpectralConfig::default())
        .unwrap_err();
    assert!(matches!(err, RirkitError::MissingDataset { ref name } if name == "[3, 3]_out_mag"));

    let config = SpectralConfig {
        skip_missing: true,
        ..Default::default()
    };
    let report = evaluate_spectral(&mut store, &MeanAbsoluteError, &config).expect("skipped");
    assert_eq!(report.keys_evaluated, 1);
    assert_eq!(report.keys_skipped, 1);
    assert_eq!(report.magnitude_loss, Some(0.0));
}

#[test]
fn test_archive_without_keys_has_no_loss() {
    let mut store = stats();
    let report = evaluate_spectral(&mut store, &MeanAbsoluteError, &SpectralConfig::default())
        .expect("evaluation runs");
    assert_eq!(report.keys_evaluated, 0);
    assert_eq!(report.magnitude_loss, None);
    assert_eq!(report.phase_loss, None);
}

#[test]
fn test_missing_statistics_fail() {
    let mut store = BTreeMap::new();
    add_exact_pair(&mut store, "[0, 1]");
    let err = evaluate_spectral(&mut store, &MeanAbsoluteError, &SpectralConfig::default())
        .unwrap_err();
    assert!(matches!(err, RirkitError::MissingDataset { ref name } if name == "mean"));
}

#[test]
fn test_npz_archive_under_save_location() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = SpectralConfig {
        save_loc: Some(temp_dir.path().to_path_buf()),
        metric: SpectralMetric::Mae,
        ..Default::default()
    };
    let path = config.archive_path().expect("explicit save location");
    std::fs::create_dir_all(path.parent().expect("archive has a parent")).expect("create dirs");

    let mut source = stats();
    add_shifted_pair(&mut source, "[0, 1]");
    {
        let mut npz = NpzWriter::new(File::create(&path).expect("create npz"));
        for (name, value) in &source {
            npz.add_array(name.as_str(), &value.mapv(|v| v as f32))
                .expect("add array");
        }
        npz.finish().expect("finish npz");
    }

    let mut archive = NpzSpectralArchive::open(&path).expect("open npz");
    let distance = distance_for(config.metric);
    let report = evaluate_spectral(&mut archive, distance.as_ref(), &config).expect("evaluation runs");
    assert_eq!(report.keys_evaluated, 1);
    assert_close(report.magnitude_loss, 5.5);
    assert_close(report.phase_loss, 1.25);
}
