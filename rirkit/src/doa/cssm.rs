//! Coherent signal subspace method (CSSM) and weighted average of signal
//! subspaces (WAVES)
//!
//! Both focus every bin onto a reference frequency with unitary matrices
//! built from the current direction estimates, run MUSIC at the reference
//! frequency and refine the estimates for a fixed number of iterations. The
//! initial estimates come from broadband MUSIC.

use super::common::{
    ArrayModel, CMatrix, CVector, TINY, focusing_matrix, music_pseudo_spectrum, peaks, subspaces,
};
use super::music::music;
use num_complex::Complex64;

fn initial_estimate(model: &ArrayModel, covariances: &[CMatrix]) -> Vec<f64> {
    model.azimuths_of(&peaks(&music(model, covariances, false), model.num_src))
}

pub(crate) fn cssm(model: &ArrayModel, covariances: &[CMatrix], reference: usize) -> Vec<f64> {
    let m = model.num_mics();
    let f0 = model.freqs[reference];
    let mut estimate = initial_estimate(model, covariances);
    let mut spectrum = Vec::new();

    for _ in 0..model.num_iter {
        let a_0 = model.steering_matrix(f0, &estimate);
        let mut focused = CMatrix::zeros(m, m);
        for (cov, &freq) in covariances.iter().zip(model.freqs.iter()) {
            let t = focusing_matrix(&model.steering_matrix(freq, &estimate), &a_0);
            focused += &t * cov * t.adjoint();
        }
        let focused = focused.map(|v| v / covariances.len() as f64);

        let noise = subspaces(&focused, model.num_src).noise;
        spectrum = music_pseudo_spectrum(model, &noise, f0);
        estimate = model.azimuths_of(&peaks(&spectrum, model.num_src));
    }
    spectrum
}

pub(crate) fn waves(model: &ArrayModel, covariances: &[CMatrix], reference: usize) -> Vec<f64> {
    let m = model.num_mics();
    let num_src = model.num_src;
    let f0 = model.freqs[reference];
    let mut estimate = initial_estimate(model, covariances);
    let mut spectrum = Vec::new();

    for _ in 0..model.num_iter {
        let a_0 = model.steering_matrix(f0, &estimate);
        let mut z = CMatrix::zeros(m, num_src * covariances.len());
        for (k, (cov, &freq)) in covariances.iter().zip(model.freqs.iter()).enumerate() {
            let sub = subspaces(cov, num_src);
            let noise = sub.noise_power.max(TINY);
            let weights = CMatrix::from_diagonal(&CVector::from_iterator(
                num_src,
                sub.signal_values.iter().map(|&l| {
                    Complex64::from((l - noise).max(0.0) / (l.max(TINY) * noise).sqrt())
                }),
            ));
            let t = focusing_matrix(&model.steering_matrix(freq, &estimate), &a_0);
            let block = &t * &sub.signal * weights;
            z.columns_mut(k * num_src, num_src).copy_from(&block);
        }

        let noise = subspaces(&(&z * z.adjoint()), num_src).noise;
        spectrum = music_pseudo_spectrum(model, &noise, f0);
        estimate = model.azimuths_of(&peaks(&spectrum, num_src));
    }
    spectrum
}
