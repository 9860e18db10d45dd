//! FRIDA dirty image
//!
//! The dirty image is the back projection of the cross-microphone
//! visibilities onto the azimuth grid. It is complex valued; the direction
//! estimate is the argmax of its magnitude.

use super::common::{ArrayModel, CMatrix};
use num_complex::Complex64;

pub(crate) fn dirty_image(model: &ArrayModel, covariances: &[CMatrix]) -> Vec<Complex64> {
    let m = model.num_mics();
    let n = covariances.len().max(1) as f64;
    model
        .grid
        .iter()
        .map(|&theta| {
            let mut acc = Complex64::new(0.0, 0.0);
            for (cov, &freq) in covariances.iter().zip(model.freqs.iter()) {
                let a = model.steering(freq, theta);
                for p in 0..m {
                    for q in 0..m {
                        if p != q {
                            acc += cov[(p, q)] * (a[p] * a[q].conj()).conj();
                        }
                    }
                }
            }
            acc / n
        })
        .collect()
}
