//! Direction of arrival estimation on planar microphone arrays
//!
//! A [`DoaBackend`] builds one [`DoaEstimator`] per algorithm and array
//! geometry. Estimators consume a (channel, bin, frame) spectrogram and return
//! a response over a uniform azimuth grid covering [0, 2π); the estimated
//! bearing is the grid index of its maximum.
//!
//! The bundled [`SubspaceBackend`] implements the classic narrowband and
//! broadband estimators on top of frame-averaged spatial covariances:
//!
//! | Algorithm  | Response |
//! |------------|----------|
//! | MUSIC      | noise subspace pseudo-spectrum, averaged over bins |
//! | NormMUSIC  | same, each bin normalized to a maximum of one |
//! | SRP        | SRP-PHAT steered power |
//! | CSSM       | coherent focusing, iterated |
//! | WAVES      | weighted focused signal subspaces, iterated |
//! | TOPS       | orthogonality of projected subspaces |
//! | FRIDA      | complex dirty image of cross-microphone visibilities |

mod common;
mod cssm;
mod frida;
mod music;
mod srp;
mod tops;

use crate::config::DoaConfig;
use crate::error::{Result, RirkitError};
use common::ArrayModel;
use ndarray::ArrayView3;
use num_complex::Complex64;
use schemars::JsonSchema;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Supported estimators, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum DoaAlgorithm {
    #[serde(rename = "MUSIC")]
    Music,
    #[serde(rename = "NormMUSIC")]
    NormMusic,
    #[serde(rename = "SRP")]
    Srp,
    #[serde(rename = "CSSM")]
    Cssm,
    #[serde(rename = "WAVES")]
    Waves,
    #[serde(rename = "TOPS")]
    Tops,
    #[serde(rename = "FRIDA")]
    Frida,
}

impl DoaAlgorithm {
    pub fn all() -> Vec<DoaAlgorithm> {
        vec![
            DoaAlgorithm::Music,
            DoaAlgorithm::NormMusic,
            DoaAlgorithm::Srp,
            DoaAlgorithm::Cssm,
            DoaAlgorithm::Waves,
            DoaAlgorithm::Tops,
            DoaAlgorithm::Frida,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            DoaAlgorithm::Music => "MUSIC",
            DoaAlgorithm::NormMusic => "NormMUSIC",
            DoaAlgorithm::Srp => "SRP",
            DoaAlgorithm::Cssm => "CSSM",
            DoaAlgorithm::Waves => "WAVES",
            DoaAlgorithm::Tops => "TOPS",
            DoaAlgorithm::Frida => "FRIDA",
        }
    }
}

impl fmt::Display for DoaAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DoaAlgorithm {
    type Err = RirkitError;

    fn from_str(s: &str) -> Result<Self> {
        DoaAlgorithm::all()
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RirkitError::UnknownAlgorithm {
                name: s.to_string(),
            })
    }
}

/// Response of an estimator over the azimuth grid
#[derive(Debug, Clone, PartialEq)]
pub enum DoaResponse {
    /// Real valued spatial likelihood
    Likelihood(Vec<f64>),
    /// Complex dirty image; only its magnitude is meaningful
    DirtyImage(Vec<Complex64>),
}

impl DoaResponse {
    pub fn len(&self) -> usize {
        match self {
            DoaResponse::Likelihood(v) => v.len(),
            DoaResponse::DirtyImage(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        match self {
            DoaResponse::Likelihood(v) => v.clone(),
            DoaResponse::DirtyImage(v) => v.iter().map(|c| c.norm()).collect(),
        }
    }

    /// Grid index of the first maximum (of the magnitude for dirty images)
    pub fn argmax(&self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(common::argmax(&self.magnitudes()))
        }
    }
}

/// Likelihoods serialize as numbers, dirty images as `[re, im]` pairs
impl Serialize for DoaResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        match self {
            DoaResponse::Likelihood(values) => {
                for v in values {
                    seq.serialize_element(v)?;
                }
            }
            DoaResponse::DirtyImage(values) => {
                for c in values {
                    seq.serialize_element(&[c.re, c.im])?;
                }
            }
        }
        seq.end()
    }
}

/// Parameters shared by every estimator of a run
#[derive(Debug, Clone, PartialEq)]
pub struct DoaSettings {
    pub sample_rate: f64,
    pub n_fft: usize,
    /// Frequency range used by the estimators (Hz)
    pub freq_range: [f64; 2],
    /// Number of azimuth grid points over [0, 2π)
    pub n_grid: usize,
    pub num_src: usize,
    pub speed_of_sound: f64,
    /// Refinement iterations of CSSM and WAVES
    pub num_iter: usize,
}

impl Default for DoaSettings {
    fn default() -> Self {
        Self::from(&DoaConfig::default())
    }
}

impl From<&DoaConfig> for DoaSettings {
    fn from(config: &DoaConfig) -> Self {
        Self {
            sample_rate: config.sample_rate as f64,
            n_fft: config.n_fft,
            freq_range: config.freq_range,
            n_grid: config.n_grid,
            num_src: config.num_src,
            speed_of_sound: config.speed_of_sound,
            num_iter: config.num_iter,
        }
    }
}

/// Locates sources in the spectrogram of one array recording
pub trait DoaEstimator {
    /// `spectrogram` is (channel, bin, frame), channels in array order
    fn locate(&self, spectrogram: ArrayView3<Complex64>) -> Result<DoaResponse>;
}

/// Builds estimators for an array geometry
pub trait DoaBackend {
    /// `mics` are the capsule positions in the horizontal plane (m)
    fn estimator(&self, algorithm: DoaAlgorithm, mics: &[[f64; 2]]) -> Result<Box<dyn DoaEstimator>>;
}

/// Bundled covariance based estimators
#[derive(Debug, Clone, Default)]
pub struct SubspaceBackend {
    settings: DoaSettings,
}

impl SubspaceBackend {
    pub fn new(settings: DoaSettings) -> Self {
        Self { settings }
    }
}

impl DoaBackend for SubspaceBackend {
    fn estimator(&self, algorithm: DoaAlgorithm, mics: &[[f64; 2]]) -> Result<Box<dyn DoaEstimator>> {
        Ok(Box::new(SubspaceEstimator {
            algorithm,
            model: ArrayModel::new(mics, &self.settings)?,
        }))
    }
}

struct SubspaceEstimator {
    algorithm: DoaAlgorithm,
    model: ArrayModel,
}

impl DoaEstimator for SubspaceEstimator {
    fn locate(&self, spectrogram: ArrayView3<Complex64>) -> Result<DoaResponse> {
        let model = &self.model;
        model.check_shape(spectrogram)?;
        let covariances = model.covariances(spectrogram);
        let reference = model.reference_bin(spectrogram);

        Ok(match self.algorithm {
            DoaAlgorithm::Music => DoaResponse::Likelihood(music::music(model, &covariances, false)),
            DoaAlgorithm::NormMusic => {
                DoaResponse::Likelihood(music::music(model, &covariances, true))
            }
            DoaAlgorithm::Srp => DoaResponse::Likelihood(srp::srp_phat(model, spectrogram)),
            DoaAlgorithm::Cssm => {
                DoaResponse::Likelihood(cssm::cssm(model, &covariances, reference))
            }
            DoaAlgorithm::Waves => {
                DoaResponse::Likelihood(cssm::waves(model, &covariances, reference))
            }
            DoaAlgorithm::Tops => {
                DoaResponse::Likelihood(tops::tops(model, &covariances, reference)?)
            }
            DoaAlgorithm::Frida => DoaResponse::DirtyImage(frida::dirty_image(model, &covariances)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::circular_2d_array;
    use crate::stft::{SpectralTransform, Stft};
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const FS: f64 = 22050.0;
    // small enough to keep the array free of spatial aliasing below 4 kHz
    const RADIUS: f64 = 0.025;

    /// Broadband noise from `azimuth_deg` reaching a 4 capsule array, with
    /// fractional delays applied in the frequency domain
    fn plane_wave(azimuth_deg: f64, seed: u64) -> Array2<f64> {
        let n = 8192;
        let mut rng = StdRng::seed_from_u64(seed);
        let source: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mics = circular_2d_array([0.0, 0.0], 4, 0.0, RADIUS);
        let (sin, cos) = azimuth_deg.to_radians().sin_cos();

        let mut planner = rustfft::FftPlanner::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        let mut spectrum: Vec<Complex64> = source.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        forward.process(&mut spectrum);

        let mut out = Array2::zeros((4, n));
        for (m, p) in mics.iter().enumerate() {
            // capsules closer to the source hear it earlier
            let advance = (p[0] * cos + p[1] * sin) / 343.0;
            let mut shifted: Vec<Complex64> = spectrum
                .iter()
                .enumerate()
                .map(|(k, &x)| {
                    let f = if k <= n / 2 { k as f64 } else { k as f64 - n as f64 } * FS / n as f64;
                    x * Complex64::from_polar(1.0, 2.0 * std::f64::consts::PI * f * advance)
                })
                .collect();
            inverse.process(&mut shifted);
            for (t, v) in shifted.iter().enumerate() {
                out[[m, t]] = v.re / n as f64;
            }
        }
        out
    }

    fn estimate(algorithm: DoaAlgorithm, azimuth_deg: f64) -> usize {
        let signals = plane_wave(azimuth_deg, 7);
        let spectrogram = Stft::new(512, 128).transform(signals.view());
        let mics = circular_2d_array([0.0, 0.0], 4, 0.0, RADIUS);
        let estimator = SubspaceBackend::default()
            .estimator(algorithm, &mics)
            .expect("valid geometry");
        estimator
            .locate(spectrogram.view())
            .expect("locate succeeds")
            .argmax()
            .expect("non-empty grid")
    }

    fn circular_distance(a: usize, b: usize) -> usize {
        let d = a.abs_diff(b) % 360;
        d.min(360 - d)
    }

    #[test]
    fn test_algorithm_names_round_trip() {
        for algorithm in DoaAlgorithm::all() {
            assert_eq!(algorithm.name().parse::<DoaAlgorithm>().expect("known"), algorithm);
        }
        assert_eq!("normmusic".parse::<DoaAlgorithm>().expect("case"), DoaAlgorithm::NormMusic);
        assert!(matches!(
            "ESPRIT".parse::<DoaAlgorithm>(),
            Err(RirkitError::UnknownAlgorithm { .. })
        ));
        assert_eq!(serde_json::to_string(&DoaAlgorithm::NormMusic).expect("json"), "\"NormMUSIC\"");
    }

    #[test]
    fn test_every_algorithm_finds_a_plane_wave() {
        for algorithm in DoaAlgorithm::all() {
            for azimuth in [30.0, 200.0] {
                let index = estimate(algorithm, azimuth);
                assert!(
                    circular_distance(index, azimuth as usize) <= 5,
                    "{} estimated {} for {}",
                    algorithm,
                    index,
                    azimuth
                );
            }
        }
    }

    #[test]
    fn test_frida_returns_dirty_image() {
        let signals = plane_wave(90.0, 3);
        let spectrogram = Stft::new(512, 128).transform(signals.view());
        let mics = circular_2d_array([0.0, 0.0], 4, 0.0, RADIUS);
        let response = SubspaceBackend::default()
            .estimator(DoaAlgorithm::Frida, &mics)
            .expect("valid geometry")
            .locate(spectrogram.view())
            .expect("locate succeeds");
        assert!(matches!(response, DoaResponse::DirtyImage(_)));
        assert_eq!(response.len(), 360);
    }

    #[test]
    fn test_channel_count_mismatch() {
        let mics = circular_2d_array([0.0, 0.0], 4, 0.0, RADIUS);
        let estimator = SubspaceBackend::default()
            .estimator(DoaAlgorithm::Music, &mics)
            .expect("valid geometry");
        let spectrogram = ndarray::Array3::<Complex64>::zeros((3, 257, 10));
        assert!(matches!(
            estimator.locate(spectrogram.view()),
            Err(RirkitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_response_serialization() {
        let likelihood = DoaResponse::Likelihood(vec![0.5, 1.0]);
        assert_eq!(serde_json::to_string(&likelihood).expect("json"), "[0.5,1.0]");
        let image = DoaResponse::DirtyImage(vec![Complex64::new(1.0, -2.0)]);
        assert_eq!(serde_json::to_string(&image).expect("json"), "[[1.0,-2.0]]");
        assert_eq!(image.argmax(), Some(0));
        assert_eq!(DoaResponse::Likelihood(vec![]).argmax(), None);
    }
}
