//! Steered response power with phase transform (SRP-PHAT)

use super::common::{ArrayModel, TINY, covariance};
use ndarray::ArrayView3;
use num_complex::Complex64;

/// Power of the whitened array output steered over the azimuth grid
///
/// Only cross terms contribute; the result is normalized by the number of
/// bins and microphone pairs so it lies in [-1, 1].
pub(crate) fn srp_phat(model: &ArrayModel, spectrogram: ArrayView3<Complex64>) -> Vec<f64> {
    let m = model.num_mics();
    let whitened: Vec<_> = model
        .bins
        .iter()
        .map(|&bin| covariance(spectrogram, bin, |x| x / x.norm().max(TINY)))
        .collect();
    let pairs = (m * (m - 1) / 2).max(1) as f64;
    let norm = pairs * whitened.len().max(1) as f64;

    model
        .grid
        .iter()
        .map(|&theta| {
            let mut power = 0.0;
            for (cov, &freq) in whitened.iter().zip(model.freqs.iter()) {
                let a = model.steering(freq, theta);
                for i in 0..m {
                    for j in i + 1..m {
                        power += 2.0 * (a[i].conj() * cov[(i, j)] * a[j]).re;
                    }
                }
            }
            power / (2.0 * norm)
        })
        .collect()
}
