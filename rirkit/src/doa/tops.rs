//! Test of orthogonality of projected subspaces (TOPS)

use super::common::{ArrayModel, CMatrix, TINY, sorted_eigen, subspaces};
use crate::error::{Result, RirkitError};

/// `1 / σ_min(D(θ))` over the azimuth grid
///
/// The signal subspace of the reference bin is shifted to every other bin,
/// projected away from the steering vector of the candidate direction and
/// tested for orthogonality against that bin's noise subspace.
pub(crate) fn tops(model: &ArrayModel, covariances: &[CMatrix], reference: usize) -> Result<Vec<f64>> {
    if covariances.len() < 2 {
        return Err(RirkitError::InvalidConfig {
            message: "TOPS needs at least 2 frequency bins".to_string(),
        });
    }
    let m = model.num_mics();
    let num_src = model.num_src;
    let n_noise = m - num_src;
    let f0 = model.freqs[reference];
    let signal_0 = subspaces(&covariances[reference], num_src).signal;
    let others: Vec<(f64, CMatrix)> = covariances
        .iter()
        .zip(model.freqs.iter())
        .enumerate()
        .filter(|(k, _)| *k != reference)
        .map(|(_, (cov, &freq))| (freq, subspaces(cov, num_src).noise))
        .collect();

    Ok(model
        .grid
        .iter()
        .map(|&theta| {
            let mut d = CMatrix::zeros(num_src, n_noise * others.len());
            for (i, (freq, noise)) in others.iter().enumerate() {
                let a = model.steering(*freq, theta);
                let shift = model.steering(freq - f0, theta);
                let shifted = CMatrix::from_fn(m, num_src, |r, c| shift[r] * signal_0[(r, c)]);
                let scale = a.norm_squared().max(TINY);
                let projector =
                    CMatrix::identity(m, m) - (&a * a.adjoint()).map(|v| v / scale);
                let block = (projector * shifted).adjoint() * noise;
                d.columns_mut(i * n_noise, n_noise).copy_from(&block);
            }
            let (values, _) = sorted_eigen(&(&d * d.adjoint()));
            1.0 / values[0].max(0.0).sqrt().max(TINY)
        })
        .collect())
}
