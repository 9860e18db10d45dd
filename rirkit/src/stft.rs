//! Short-time Fourier transform of multichannel waveforms

use ndarray::{Array3, ArrayView1, ArrayView2, s};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Maps a (channel, sample) waveform to a (channel, bin, frame) spectrogram
pub trait SpectralTransform {
    fn n_fft(&self) -> usize;

    fn transform(&self, channels: ArrayView2<f64>) -> Array3<Complex64>;
}

/// Centered STFT with a periodic Hann window
///
/// Signals are zero padded by `n_fft / 2` on both sides so frame `t` is
/// centered on sample `t * hop_length`. The forward FFT is unscaled and only
/// the `n_fft / 2 + 1` non-negative frequencies are kept.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for Stft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stft")
            .field("n_fft", &self.n_fft)
            .field("hop_length", &self.hop_length)
            .finish()
    }
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let n_fft = n_fft.max(1);
        let window = (0..n_fft)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f64 / n_fft as f64).cos())
            .collect();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop_length: hop_length.max(1),
            window,
            fft,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Number of frames for a signal of `len` samples
    pub fn n_frames(&self, len: usize) -> usize {
        let padded = len + 2 * (self.n_fft / 2);
        if padded < self.n_fft {
            0
        } else {
            1 + (padded - self.n_fft) / self.hop_length
        }
    }

    fn channel_into(&self, signal: ArrayView1<f64>, out: &mut ndarray::ArrayViewMut2<Complex64>) {
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0; signal.len() + 2 * pad];
        for (dst, &src) in padded[pad..].iter_mut().zip(signal.iter()) {
            *dst = src;
        }

        let mut buffer = vec![Complex64::new(0.0, 0.0); self.n_fft];
        for frame in 0..out.ncols() {
            let start = frame * self.hop_length;
            for (k, value) in buffer.iter_mut().enumerate() {
                *value = Complex64::new(padded[start + k] * self.window[k], 0.0);
            }
            self.fft.process(&mut buffer);
            for bin in 0..out.nrows() {
                out[[bin, frame]] = buffer[bin];
            }
        }
    }
}

impl SpectralTransform for Stft {
    fn n_fft(&self) -> usize {
        self.n_fft
    }

    fn transform(&self, channels: ArrayView2<f64>) -> Array3<Complex64> {
        let n_channels = channels.nrows();
        let n_frames = self.n_frames(channels.ncols());
        let mut out = Array3::zeros((n_channels, self.n_bins(), n_frames));
        for (c, signal) in channels.outer_iter().enumerate() {
            let mut view = out.slice_mut(s![c, .., ..]);
            self.channel_into(signal, &mut view);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_shape() {
        let stft = Stft::new(512, 128);
        let x = Array2::<f64>::zeros((4, 22050));
        let spec = stft.transform(x.view());
        assert_eq!(spec.dim(), (4, 257, 1 + 22050 / 128));
    }

    #[test]
    fn test_periodic_hann_window() {
        let stft = Stft::new(8, 2);
        assert_eq!(stft.window[0], 0.0);
        assert!((stft.window[4] - 1.0).abs() < 1e-12);
        assert!((stft.window[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let n_fft = 256;
        let stft = Stft::new(n_fft, 64);
        let bin = 20;
        let x = Array2::from_shape_fn((1, 4096), |(_, n)| {
            (2.0 * PI * bin as f64 * n as f64 / n_fft as f64).sin()
        });
        let spec = stft.transform(x.view());
        let frame = spec.dim().2 / 2;
        let peak = (0..stft.n_bins())
            .max_by(|&a, &b| {
                spec[[0, a, frame]]
                    .norm()
                    .total_cmp(&spec[[0, b, frame]].norm())
            })
            .expect("bins are not empty");
        assert_eq!(peak, bin);
        // Hann windowed unit sine peaks at n_fft / 4
        assert!((spec[[0, bin, frame]].norm() - n_fft as f64 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_frames_are_centered() {
        let stft = Stft::new(16, 4);
        let mut x = Array2::<f64>::zeros((1, 64));
        x[[0, 20]] = 1.0;
        let spec = stft.transform(x.view());
        // frame 5 is centered on sample 20, where the window peaks
        assert!((spec[[0, 0, 5]].re - 1.0).abs() < 1e-12);
        assert!(spec[[0, 0, 0]].norm() < 1e-12);
    }
}
