//! Spectral archive: de-normalization statistics plus per-key spectra
//!
//! Dataset names are `mean`, `std`, `phase_std` and, for every pair key,
//! `<key>_out_mag`, `<key>_gt_mag`, `<key>_out_phase` and `<key>_gt_phase`.
//! The bundled store reads NPZ archives lazily, one dataset at a time.

use crate::error::{Result, RirkitError};
use ndarray::{ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const MEAN: &str = "mean";
pub const STD: &str = "std";
pub const PHASE_STD: &str = "phase_std";

/// Suffixes of the four per-key datasets
pub const OUT_MAG: &str = "_out_mag";
pub const GT_MAG: &str = "_gt_mag";
pub const OUT_PHASE: &str = "_out_phase";
pub const GT_PHASE: &str = "_gt_phase";

/// Random access store of named arrays
pub trait SpectralStore {
    fn names(&self) -> Vec<String>;

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>>;
}

impl SpectralStore for BTreeMap<String, ArrayD<f64>> {
    fn names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RirkitError::MissingDataset {
                name: name.to_string(),
            })
    }
}

/// NPZ archive; `f32` datasets are widened to `f64` on read
pub struct NpzSpectralArchive {
    reader: NpzReader<BufReader<File>>,
    /// Dataset name without `.npy` -> entry name in the zip
    entries: BTreeMap<String, String>,
}

impl NpzSpectralArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| RirkitError::file_operation(path, e))?;
        let mut reader = NpzReader::new(BufReader::new(file))?;
        let entries = reader
            .names()?
            .into_iter()
            .map(|entry| {
                let name = entry.strip_suffix(".npy").unwrap_or(&entry).to_string();
                (name, entry)
            })
            .collect();
        Ok(Self { reader, entries })
    }
}

impl SpectralStore for NpzSpectralArchive {
    fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>> {
        let Some(entry) = self.entries.get(name) else {
            return Err(RirkitError::MissingDataset {
                name: name.to_string(),
            });
        };
        match self.reader.by_name::<OwnedRepr<f64>, IxDyn>(entry) {
            Ok(array) => Ok(array),
            Err(_) => {
                let array = self.reader.by_name::<OwnedRepr<f32>, IxDyn>(entry)?;
                Ok(array.mapv(f64::from))
            }
        }
    }
}

/// Pair identifier of a per-key dataset name: everything up to the first `]`
pub fn base_key(name: &str) -> Option<&str> {
    name.find(']').map(|end| &name[..=end])
}

/// Distinct pair identifiers of an archive, sorted
pub fn unique_base_keys<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|n| ![MEAN, STD, PHASE_STD].contains(&n.as_ref()))
        .filter_map(|n| base_key(n.as_ref()).map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};
    use ndarray_npy::NpzWriter;
    use tempfile::TempDir;

    #[test]
    fn test_suffix_variants_collapse_to_one_key() {
        let names = ["[0,1]_out_mag", "[0,1]_gt_mag", "[0,1]_out_phase", "[0,1]_gt_phase"];
        assert_eq!(unique_base_keys(names), vec!["[0,1]".to_string()]);
    }

    #[test]
    fn test_statistics_are_not_keys() {
        let names = ["mean", "std", "phase_std", "[3, 4]_gt_mag", "[1, 2]_gt_mag"];
        assert_eq!(
            unique_base_keys(names),
            vec!["[1, 2]".to_string(), "[3, 4]".to_string()]
        );
        assert_eq!(base_key("no_bracket"), None);
    }

    #[test]
    fn test_npz_archive_reads_f32_and_f64() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("output_test_NAF.npz");
        {
            let file = File::create(&path).expect("create npz");
            let mut npz = NpzWriter::new(file);
            npz.add_array("mean", &Array3::<f32>::from_elem((1, 2, 3), 0.5))
                .expect("add mean");
            npz.add_array("[0, 1]_out_mag", &Array1::<f64>::from(vec![1.0, 2.0]))
                .expect("add mag");
            npz.finish().expect("finish npz");
        }

        let mut archive = NpzSpectralArchive::open(&path).expect("open npz");
        assert_eq!(
            archive.names(),
            vec!["[0, 1]_out_mag".to_string(), "mean".to_string()]
        );
        let mean = archive.read("mean").expect("f32 dataset");
        assert_eq!(mean.shape(), &[1, 2, 3]);
        assert_eq!(mean[[0, 1, 2]], 0.5);
        let mag = archive.read("[0, 1]_out_mag").expect("f64 dataset");
        assert_eq!(mag.as_slice(), Some(&[1.0, 2.0][..]));
        assert!(matches!(
            archive.read("[0, 1]_gt_mag"),
            Err(RirkitError::MissingDataset { .. })
        ));
    }
}
