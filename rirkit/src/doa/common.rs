//! Far-field array model and subspace helpers shared by the estimators

use super::DoaSettings;
use crate::error::{Result, RirkitError};
use nalgebra::{DMatrix, DVector};
use ndarray::ArrayView3;
use num_complex::Complex64;
use std::f64::consts::PI;

pub(crate) type CMatrix = DMatrix<Complex64>;
pub(crate) type CVector = DVector<Complex64>;

/// Guards divisions by vanishing powers
pub(crate) const TINY: f64 = 1e-12;

/// Planar array, azimuth grid and frequency bins of one estimator
#[derive(Debug, Clone)]
pub(crate) struct ArrayModel {
    /// Capsule positions relative to the array centroid (m)
    pub mics: Vec<[f64; 2]>,
    /// Candidate azimuths over [0, 2π) (rad)
    pub grid: Vec<f64>,
    /// STFT bins used by the estimator
    pub bins: Vec<usize>,
    /// Center frequency of each bin (Hz)
    pub freqs: Vec<f64>,
    pub speed_of_sound: f64,
    pub num_src: usize,
    pub num_iter: usize,
}

impl ArrayModel {
    pub fn new(mics: &[[f64; 2]], settings: &DoaSettings) -> Result<Self> {
        if mics.len() < 2 {
            return Err(RirkitError::InvalidConfig {
                message: format!("DoA needs at least 2 microphones, got {}", mics.len()),
            });
        }
        if settings.num_src == 0 || settings.num_src >= mics.len() {
            return Err(RirkitError::InvalidConfig {
                message: format!(
                    "num_src ({}) must be in 1..{}",
                    settings.num_src,
                    mics.len()
                ),
            });
        }

        let n = mics.len() as f64;
        let cx = mics.iter().map(|p| p[0]).sum::<f64>() / n;
        let cy = mics.iter().map(|p| p[1]).sum::<f64>() / n;
        let mics = mics.iter().map(|p| [p[0] - cx, p[1] - cy]).collect();

        let n_fft = settings.n_fft as f64;
        let last_bin = settings.n_fft / 2;
        let to_bin = |f: f64| ((f / settings.sample_rate * n_fft).round().max(0.0) as usize).min(last_bin);
        let (low, high) = (to_bin(settings.freq_range[0]), to_bin(settings.freq_range[1]));
        if low > high {
            return Err(RirkitError::InvalidConfig {
                message: format!(
                    "frequency range {:?} selects no STFT bin",
                    settings.freq_range
                ),
            });
        }
        let bins: Vec<usize> = (low..=high).collect();
        let freqs = bins
            .iter()
            .map(|&b| b as f64 * settings.sample_rate / n_fft)
            .collect();

        let grid = (0..settings.n_grid)
            .map(|i| 2.0 * PI * i as f64 / settings.n_grid as f64)
            .collect();

        Ok(Self {
            mics,
            grid,
            bins,
            freqs,
            speed_of_sound: settings.speed_of_sound,
            num_src: settings.num_src,
            num_iter: settings.num_iter.max(1),
        })
    }

    pub fn num_mics(&self) -> usize {
        self.mics.len()
    }

    /// Far-field response `exp(j 2πf/c p·u(θ))` of every capsule
    pub fn steering(&self, freq: f64, azimuth: f64) -> CVector {
        let k = 2.0 * PI * freq / self.speed_of_sound;
        let (sin, cos) = azimuth.sin_cos();
        CVector::from_iterator(
            self.num_mics(),
            self.mics
                .iter()
                .map(|p| Complex64::from_polar(1.0, k * (p[0] * cos + p[1] * sin))),
        )
    }

    /// One steering vector per column
    pub fn steering_matrix(&self, freq: f64, azimuths: &[f64]) -> CMatrix {
        let columns: Vec<CVector> = azimuths.iter().map(|&a| self.steering(freq, a)).collect();
        CMatrix::from_fn(self.num_mics(), azimuths.len(), |r, c| columns[c][r])
    }

    pub fn azimuths_of(&self, indices: &[usize]) -> Vec<f64> {
        indices.iter().map(|&i| self.grid[i]).collect()
    }

    pub fn check_shape(&self, spectrogram: ArrayView3<Complex64>) -> Result<()> {
        let (channels, bins, frames) = spectrogram.dim();
        let needed = self.bins.last().copied().unwrap_or(0);
        if channels != self.num_mics() || bins <= needed || frames == 0 {
            return Err(RirkitError::ShapeMismatch {
                name: "spectrogram".to_string(),
                message: format!(
                    "got (channels={}, bins={}, frames={}), need {} channels, more than {} bins and one frame",
                    channels,
                    bins,
                    frames,
                    self.num_mics(),
                    needed
                ),
            });
        }
        Ok(())
    }

    /// Spatial covariance of every selected bin, averaged over frames
    pub fn covariances(&self, spectrogram: ArrayView3<Complex64>) -> Vec<CMatrix> {
        self.bins
            .iter()
            .map(|&bin| covariance(spectrogram, bin, |x| x))
            .collect()
    }

    /// Position in `bins` of the bin carrying the most energy
    pub fn reference_bin(&self, spectrogram: ArrayView3<Complex64>) -> usize {
        let energy: Vec<f64> = self
            .bins
            .iter()
            .map(|&bin| {
                spectrogram
                    .slice(ndarray::s![.., bin, ..])
                    .iter()
                    .map(|x| x.norm_sqr())
                    .sum()
            })
            .collect();
        argmax(&energy)
    }
}

/// `(1/T) Σ_t x_t x_t^H` over the frames of one bin, after mapping each entry
pub(crate) fn covariance(
    spectrogram: ArrayView3<Complex64>,
    bin: usize,
    map: impl Fn(Complex64) -> Complex64,
) -> CMatrix {
    let (channels, _, frames) = spectrogram.dim();
    let x = CMatrix::from_fn(channels, frames, |c, t| map(spectrogram[[c, bin, t]]));
    (&x * x.adjoint()).map(|v| v / frames as f64)
}

/// Eigen decomposition of a Hermitian matrix, eigenvalues ascending
pub(crate) fn sorted_eigen(matrix: &CMatrix) -> (Vec<f64>, CMatrix) {
    let n = matrix.nrows();
    let eig = matrix.clone().symmetric_eigen();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = CMatrix::from_fn(n, n, |r, c| eig.eigenvectors[(r, order[c])]);
    (values, vectors)
}

pub(crate) struct Subspaces {
    pub signal: CMatrix,
    pub noise: CMatrix,
    /// Eigenvalues of the signal subspace, ascending
    pub signal_values: Vec<f64>,
    /// Mean eigenvalue of the noise subspace
    pub noise_power: f64,
}

pub(crate) fn subspaces(matrix: &CMatrix, num_src: usize) -> Subspaces {
    let (values, vectors) = sorted_eigen(matrix);
    let n_noise = values.len() - num_src;
    let noise_power = if n_noise == 0 {
        0.0
    } else {
        values[..n_noise].iter().sum::<f64>() / n_noise as f64
    };
    Subspaces {
        signal: vectors.columns(n_noise, num_src).into_owned(),
        noise: vectors.columns(0, n_noise).into_owned(),
        signal_values: values[n_noise..].to_vec(),
        noise_power: noise_power.max(0.0),
    }
}

/// `1 / ||En^H a(θ)||²` over the azimuth grid at one frequency
pub(crate) fn music_pseudo_spectrum(model: &ArrayModel, noise: &CMatrix, freq: f64) -> Vec<f64> {
    let noise_h = noise.adjoint();
    model
        .grid
        .iter()
        .map(|&theta| {
            let projection = &noise_h * model.steering(freq, theta);
            1.0 / projection.norm_squared().max(TINY)
        })
        .collect()
}

/// Unitary `T` minimizing `||A0 - T Ak||` (rotational signal subspace focusing)
pub(crate) fn focusing_matrix(a_k: &CMatrix, a_0: &CMatrix) -> CMatrix {
    let n = a_k.nrows();
    let svd = (a_k * a_0.adjoint()).svd(true, true);
    match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => v_t.adjoint() * u.adjoint(),
        _ => CMatrix::identity(n, n),
    }
}

/// Index of the first maximum
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Indices of the `count` strongest local maxima on the circular grid
pub(crate) fn peaks(values: &[f64], count: usize) -> Vec<usize> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut maxima: Vec<usize> = (0..n)
        .filter(|&i| {
            let prev = values[(i + n - 1) % n];
            let next = values[(i + 1) % n];
            values[i] >= prev && values[i] >= next
        })
        .collect();
    maxima.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    maxima.truncate(count);
    if maxima.is_empty() {
        maxima.push(argmax(values));
    }
    maxima
}
