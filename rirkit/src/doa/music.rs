//! MUSIC and NormMUSIC

use super::common::{ArrayModel, CMatrix, music_pseudo_spectrum, subspaces};

/// Narrowband MUSIC pseudo-spectra averaged over the selected bins
///
/// With `normalize`, each bin's spectrum is scaled to a maximum of one first so
/// that a few high-SNR bins cannot dominate the average.
pub(crate) fn music(model: &ArrayModel, covariances: &[CMatrix], normalize: bool) -> Vec<f64> {
    let mut total = vec![0.0; model.grid.len()];
    for (cov, &freq) in covariances.iter().zip(model.freqs.iter()) {
        let noise = subspaces(cov, model.num_src).noise;
        let mut spectrum = music_pseudo_spectrum(model, &noise, freq);
        if normalize {
            let max = spectrum.iter().copied().fold(0.0_f64, f64::max);
            if max > 0.0 {
                spectrum.iter_mut().for_each(|v| *v /= max);
            }
        }
        for (t, v) in total.iter_mut().zip(spectrum) {
            *t += v;
        }
    }
    let n = covariances.len().max(1) as f64;
    total.iter_mut().for_each(|v| *v /= n);
    total
}
