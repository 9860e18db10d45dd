//! Inference result archive
//!
//! The inference step stores, per `"[source, mic]"` key, the ground-truth and
//! network waveforms of one microphone array as channel x sample matrices:
//!
//! ```json
//! { "[0, 1]": { "gt_wav": [[...], [...]], "net_wav": [[...], [...]] } }
//! ```
//!
//! Archives hold one entry per source and array pair and quickly outgrow
//! memory, so [`stream_inference_archive`] hands records to a callback one at
//! a time instead of building the whole map.

use crate::error::{Result, RirkitError};
use ndarray::Array2;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use std::str::FromStr;

/// Source and microphone array indices of an archive key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub source_index: usize,
    pub mic_array_index: usize,
}

impl PairKey {
    /// Parse `"[i, j]"`; brackets and quotes are ignored, so `"[i,j]"` and
    /// `"['i', 'j']"` are accepted too
    pub fn parse(key: &str) -> Result<Self> {
        let malformed = || RirkitError::MalformedKey {
            key: key.to_string(),
        };
        let cleaned: String = key
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
            .collect();
        let mut parts = cleaned.split(',').map(str::trim);
        let (Some(source), Some(mic), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        Ok(Self {
            source_index: source.parse().map_err(|_| malformed())?,
            mic_array_index: mic.parse().map_err(|_| malformed())?,
        })
    }
}

impl FromStr for PairKey {
    type Err = RirkitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.source_index, self.mic_array_index)
    }
}

/// Multichannel waveform as stored in the archive, one row per channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Waveform(pub Vec<Vec<f64>>);

impl Waveform {
    /// (channel, sample) matrix; every channel must have the same length
    pub fn to_array(&self, name: &str) -> Result<Array2<f64>> {
        let channels = self.0.len();
        let samples = self.0.first().map_or(0, Vec::len);
        if let Some(bad) = self.0.iter().find(|c| c.len() != samples) {
            return Err(RirkitError::ShapeMismatch {
                name: name.to_string(),
                message: format!(
                    "channels have different lengths ({} and {})",
                    samples,
                    bad.len()
                ),
            });
        }
        let flat: Vec<f64> = self.0.iter().flatten().copied().collect();
        Array2::from_shape_vec((channels, samples), flat).map_err(|e| {
            RirkitError::ShapeMismatch {
                name: name.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// Ground truth and prediction for one pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub gt_wav: Waveform,
    pub net_wav: Waveform,
}

struct RecordVisitor<'a, F> {
    callback: &'a mut F,
    failure: &'a mut Option<RirkitError>,
}

impl<'de, F> Visitor<'de> for RecordVisitor<'_, F>
where
    F: FnMut(String, InferenceRecord) -> Result<()>,
{
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map from pair keys to inference records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<usize, A::Error> {
        let mut count = 0;
        while let Some(key) = map.next_key::<String>()? {
            let record: InferenceRecord = map.next_value()?;
            if let Err(err) = (self.callback)(key, record) {
                *self.failure = Some(err);
                return Err(de::Error::custom("record handler failed"));
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Feed every record of a JSON archive to `callback`, in file order
///
/// Only one record is held in memory at a time. The first error returned by
/// `callback` stops the stream and is returned as is.
pub fn stream_inference_archive<R, F>(reader: R, mut callback: F) -> Result<usize>
where
    R: Read,
    F: FnMut(String, InferenceRecord) -> Result<()>,
{
    let mut failure = None;
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let result = (&mut deserializer).deserialize_map(RecordVisitor {
        callback: &mut callback,
        failure: &mut failure,
    });
    if let Some(err) = failure {
        return Err(err);
    }
    let count = result?;
    deserializer.end()?;
    Ok(count)
}

/// [`stream_inference_archive`] over a file
pub fn read_inference_archive<F>(path: &Path, callback: F) -> Result<usize>
where
    F: FnMut(String, InferenceRecord) -> Result<()>,
{
    let file = File::open(path).map_err(|e| RirkitError::file_operation(path, e))?;
    stream_inference_archive(BufReader::new(file), callback)
}

/// Serialize `value` as JSON to `path`
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| RirkitError::file_operation(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    std::io::Write::flush(&mut writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_variants() {
        let expected = PairKey {
            source_index: 12,
            mic_array_index: 3,
        };
        for key in ["[12, 3]", "[12,3]", "['12', '3']", "[ 12 ,3 ]"] {
            assert_eq!(PairKey::parse(key).expect(key), expected);
        }
        assert_eq!(expected.to_string(), "[12, 3]");
    }

    #[test]
    fn test_malformed_keys() {
        for key in ["[12]", "[a, 3]", "[1, 2, 3]", "", "[-1, 2]"] {
            let err = PairKey::parse(key).unwrap_err();
            assert!(err.is_key_error(), "{key}");
        }
    }

    #[test]
    fn test_waveform_must_be_rectangular() {
        let wave = Waveform(vec![vec![0.0, 1.0], vec![2.0]]);
        assert!(matches!(
            wave.to_array("gt_wav"),
            Err(RirkitError::ShapeMismatch { .. })
        ));
        let wave = Waveform(vec![vec![0.0, 1.0], vec![2.0, 3.0]]);
        let array = wave.to_array("gt_wav").expect("rectangular");
        assert_eq!(array.dim(), (2, 2));
        assert_eq!(array[[1, 0]], 2.0);
    }

    #[test]
    fn test_stream_visits_records_in_order() {
        let json = r#"{
            "[0, 1]": {"gt_wav": [[0.0, 1.0]], "net_wav": [[0.5, 1.5]]},
            "[1, 0]": {"gt_wav": [[2.0]], "net_wav": [[3.0]]}
        }"#;
        let mut keys = Vec::new();
        let count = stream_inference_archive(json.as_bytes(), |key, record| {
            keys.push((key, record.net_wav.0[0][0]));
            Ok(())
        })
        .expect("valid archive");
        assert_eq!(count, 2);
        assert_eq!(
            keys,
            vec![("[0, 1]".to_string(), 0.5), ("[1, 0]".to_string(), 3.0)]
        );
    }

    #[test]
    fn test_callback_error_is_returned() {
        let json = r#"{"[0, 1]": {"gt_wav": [[0.0]], "net_wav": [[0.0]]}, "[1, 0]": {"gt_wav": [[0.0]], "net_wav": [[0.0]]}}"#;
        let mut seen = 0;
        let err = stream_inference_archive(json.as_bytes(), |key, _| {
            seen += 1;
            Err(RirkitError::MalformedKey { key })
        })
        .unwrap_err();
        assert_eq!(seen, 1);
        assert!(matches!(err, RirkitError::MalformedKey { key } if key == "[0, 1]"));
    }

    #[test]
    fn test_truncated_archive_is_json_error() {
        let json = r#"{"[0, 1]": {"gt_wav": [[0.0]], "net_wav": [[0.0]]}"#;
        let err = stream_inference_archive(json.as_bytes(), |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, RirkitError::Json(_)));
    }
}
