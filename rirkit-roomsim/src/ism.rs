//! Image Source Method (ISM) renderer for shoebox rooms
//!
//! Every wall reflection is replaced by a mirrored copy of the source. A path
//! with `n` reflections contributes `R^n / (4πd)` at a delay of `d / c`, placed
//! on the sample grid with a Hann-windowed sinc fractional delay filter. The
//! filter is centered, so every response carries a global delay of half the
//! filter length.

use crate::{Microphone, Point3D, RoomSimError, RoomSimulator, SPEED_OF_SOUND, ShoeBox};
use log::debug;
use std::f64::consts::PI;

/// A mirrored copy of the source
#[derive(Debug, Clone, Copy)]
pub struct ImageSource {
    pub position: Point3D,
    /// Number of wall reflections along the path
    pub order: usize,
}

/// Enumerate all image sources with at most `room.max_order` reflections
///
/// Along one axis of length L, image coordinates are `(1 - 2p) * s + 2 * m * L`
/// for p in {0, 1} and integer m, with `|2m - p|` reflections.
pub fn image_sources(room: &ShoeBox, source: &Point3D) -> Vec<ImageSource> {
    let dims = room.dimensions();
    let src = source.to_array();
    let max_order = room.max_order;
    let axes: Vec<Vec<(f64, usize)>> = (0..3)
        .map(|a| axis_images(src[a], dims[a], max_order))
        .collect();

    let mut images = Vec::new();
    for &(x, ox) in &axes[0] {
        for &(y, oy) in &axes[1] {
            if ox + oy > max_order {
                continue;
            }
            for &(z, oz) in &axes[2] {
                let order = ox + oy + oz;
                if order <= max_order {
                    images.push(ImageSource {
                        position: Point3D::new(x, y, z),
                        order,
                    });
                }
            }
        }
    }
    images
}

fn axis_images(coord: f64, length: f64, max_order: usize) -> Vec<(f64, usize)> {
    let n = max_order as i64;
    let mut images = Vec::new();
    for m in -n..=n {
        for p in 0..=1i64 {
            let reflections = (2 * m - p).unsigned_abs() as usize;
            if reflections > max_order {
                continue;
            }
            let sign = if p == 0 { 1.0 } else { -1.0 };
            images.push((sign * coord + 2.0 * m as f64 * length, reflections));
        }
    }
    images
}

/// Normalized sinc: sin(πx) / (πx)
fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Image source renderer
#[derive(Debug, Clone)]
pub struct ImageSourceSimulator {
    /// Speed of sound (m/s)
    pub speed_of_sound: f64,
    /// Length of the windowed-sinc fractional delay filter (taps)
    pub fractional_delay_length: usize,
}

impl Default for ImageSourceSimulator {
    fn default() -> Self {
        Self {
            speed_of_sound: SPEED_OF_SOUND,
            fractional_delay_length: 81,
        }
    }
}

impl ImageSourceSimulator {
    pub fn new(speed_of_sound: f64, fractional_delay_length: usize) -> Self {
        Self {
            speed_of_sound,
            fractional_delay_length: fractional_delay_length.max(1),
        }
    }

    /// Global delay (samples) added by the centered fractional delay filter
    pub fn latency(&self) -> usize {
        self.fractional_delay_length / 2
    }

    fn render(&self, room: &ShoeBox, images: &[ImageSource], mic: &Microphone) -> Vec<f64> {
        let fs = room.sample_rate;
        let beta = room.reflection_coefficient();
        let half = self.latency();

        let arrivals: Vec<(f64, f64)> = images
            .iter()
            .filter_map(|image| {
                let d = image.position.distance_to(&mic.position);
                if d < 1e-9 {
                    return None;
                }
                let direction = [
                    (image.position.x - mic.position.x) / d,
                    (image.position.y - mic.position.y) / d,
                    (image.position.z - mic.position.z) / d,
                ];
                let gain = mic.directivity.gain(direction) * beta.powi(image.order as i32)
                    / (4.0 * PI * d);
                Some((d / self.speed_of_sound * fs, gain))
            })
            .collect();

        let max_delay = arrivals.iter().map(|a| a.0).fold(0.0_f64, f64::max);
        let mut rir = vec![0.0; max_delay.ceil() as usize + 2 * half + 1];
        let window_half_width = half as f64 + 1.0;

        for (delay, gain) in arrivals {
            let whole = delay.floor();
            let frac = delay - whole;
            let base = whole as usize;
            for k in 0..=2 * half {
                let x = k as f64 - half as f64 - frac;
                let window = 0.5 * (1.0 + (PI * x / window_half_width).cos());
                rir[base + k] += gain * sinc(x) * window;
            }
        }

        rir
    }
}

impl RoomSimulator for ImageSourceSimulator {
    fn compute_rir(
        &self,
        room: &ShoeBox,
        source: &Point3D,
        mics: &[Microphone],
    ) -> Result<Vec<Vec<f64>>, RoomSimError> {
        if !room.contains(source) {
            return Err(RoomSimError::OutsideRoom {
                what: "source".to_string(),
                x: source.x,
                y: source.y,
                z: source.z,
            });
        }
        if let Some((idx, mic)) = mics
            .iter()
            .enumerate()
            .find(|(_, m)| !room.contains(&m.position))
        {
            return Err(RoomSimError::OutsideRoom {
                what: format!("microphone {}", idx),
                x: mic.position.x,
                y: mic.position.y,
                z: mic.position.z,
            });
        }

        let images = image_sources(room, source);
        debug!(
            "rendering {} image sources (max order {}) for {} microphones",
            images.len(),
            room.max_order,
            mics.len()
        );

        Ok(mics
            .iter()
            .map(|mic| self.render(room, &images, mic))
            .collect())
    }
}
