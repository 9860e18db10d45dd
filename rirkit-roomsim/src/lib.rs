//! Room impulse response simulation for shoebox rooms
//!
//! This crate renders impulse responses between one source and a set of
//! microphones placed in a rectangular room. It provides:
//! - Shoebox geometry with a uniform wall absorption coefficient
//! - Sabine and inverse Sabine relations (RT60 <-> absorption, reflection order)
//! - Omnidirectional and cardioid microphone capsules
//! - An Image Source Method (ISM) renderer with fractional delays
//!
//! Every renderer implements [`RoomSimulator`], so callers can swap the bundled
//! image source backend for another engine or a deterministic stub.

use serde::{Deserialize, Serialize};

mod error;
mod ism;

pub use error::RoomSimError;
pub use ism::{ImageSource, ImageSourceSimulator, image_sources};

/// Speed of sound in air at room temperature (m/s)
pub const SPEED_OF_SOUND: f64 = 343.0;

// ============================================================================
// Room Geometry Types
// ============================================================================

/// 3D point in space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Point3D {
    fn from(p: [f64; 3]) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

/// Rectangular room whose six walls share one energy absorption coefficient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShoeBox {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    /// Energy absorption coefficient of every wall
    pub absorption: f64,
    /// Highest number of wall reflections rendered per path
    pub max_order: usize,
    /// Sample rate of rendered impulse responses (Hz)
    pub sample_rate: f64,
}

impl ShoeBox {
    /// Create a room from explicit absorption and reflection order
    pub fn new(
        dims: [f64; 3],
        absorption: f64,
        max_order: usize,
        sample_rate: f64,
    ) -> Result<Self, RoomSimError> {
        validate_dimensions(&dims)?;
        if !(0.0..=1.0).contains(&absorption) {
            return Err(RoomSimError::InvalidAbsorption(absorption));
        }
        if sample_rate.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater) {
            return Err(RoomSimError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            width: dims[0],
            depth: dims[1],
            height: dims[2],
            absorption,
            max_order,
            sample_rate,
        })
    }

    /// Create a room reaching `rt60` seconds of reverberation
    ///
    /// Absorption and reflection order come from [`inverse_sabine`].
    pub fn from_rt60(
        dims: [f64; 3],
        rt60: f64,
        sample_rate: f64,
        speed_of_sound: f64,
    ) -> Result<Self, RoomSimError> {
        let (absorption, max_order) = inverse_sabine(rt60, &dims, speed_of_sound)?;
        Self::new(dims, absorption, max_order, sample_rate)
    }

    pub fn dimensions(&self) -> [f64; 3] {
        [self.width, self.depth, self.height]
    }

    pub fn volume(&self) -> f64 {
        self.width * self.depth * self.height
    }

    pub fn surface_area(&self) -> f64 {
        2.0 * (self.width * self.depth + self.width * self.height + self.depth * self.height)
    }

    /// Pressure reflection coefficient: R = sqrt(1 - α)
    pub fn reflection_coefficient(&self) -> f64 {
        (1.0 - self.absorption).max(0.0).sqrt()
    }

    /// Sabine RT60 achieved by the configured absorption
    pub fn rt60_sabine(&self) -> f64 {
        rt60_sabine(self.volume(), self.absorption * self.surface_area())
    }

    /// Whether `p` lies inside the room or on a wall
    pub fn contains(&self, p: &Point3D) -> bool {
        (0.0..=self.width).contains(&p.x)
            && (0.0..=self.depth).contains(&p.y)
            && (0.0..=self.height).contains(&p.z)
    }
}

fn validate_dimensions(dims: &[f64]) -> Result<(), RoomSimError> {
    if !(2..=3).contains(&dims.len()) {
        return Err(RoomSimError::InvalidDimensions {
            dims: dims.to_vec(),
            reason: "expected 2 or 3 dimensions".to_string(),
        });
    }
    if dims.iter().any(|&d| d.partial_cmp(&0.0) != Some(std::cmp::Ordering::Greater)) {
        return Err(RoomSimError::InvalidDimensions {
            dims: dims.to_vec(),
            reason: "dimensions must be positive".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// RT60 and Reverberation Time Calculations
// ============================================================================

/// Calculate RT60 using Sabine's formula
///
/// RT60 = 0.161 * V / A
///
/// Where:
/// - V = room volume (m³)
/// - A = total absorption (sabins, m²) = Σ(αᵢ * Sᵢ)
pub fn rt60_sabine(volume: f64, total_absorption: f64) -> f64 {
    if total_absorption > 0.0 {
        0.161 * volume / total_absorption
    } else {
        f64::INFINITY // No absorption = infinite reverberation
    }
}

/// Invert Sabine's formula for a target reverberation time
///
/// Returns the uniform wall energy absorption and the reflection order needed
/// so that paths of length `c * rt60` are rendered:
///
/// - α = k * ln(10) * V / (c * S * RT60), k = 24 in 3D (12 in 2D, S = perimeter)
/// - max_order = ceil(c * RT60 / R_min - 1), R_min the smallest l1*l2/sqrt(l1²+l2²)
///
/// R is the radius of the largest circle fitting in the diamond of mirrored
/// rooms spanned by two axes.
pub fn inverse_sabine(
    rt60: f64,
    room_dim: &[f64],
    speed_of_sound: f64,
) -> Result<(f64, usize), RoomSimError> {
    validate_dimensions(room_dim)?;

    let mut radii = Vec::new();
    for i in 0..room_dim.len() {
        for j in i + 1..room_dim.len() {
            let (l1, l2) = (room_dim[i], room_dim[j]);
            radii.push(l1 * l2 / (l1 * l1 + l2 * l2).sqrt());
        }
    }

    let volume: f64 = room_dim.iter().product();
    let (surface, sabine_coef) = if room_dim.len() == 2 {
        (2.0 * room_dim.iter().sum::<f64>(), 12.0)
    } else {
        (
            2.0 * (room_dim[0] * room_dim[1]
                + room_dim[0] * room_dim[2]
                + room_dim[1] * room_dim[2]),
            24.0,
        )
    };

    let absorption = sabine_coef * 10f64.ln() * volume / (speed_of_sound * surface * rt60);
    if absorption > 1.0 {
        return Err(RoomSimError::Rt60Unreachable { rt60, absorption });
    }

    let r_min = radii.iter().copied().fold(f64::INFINITY, f64::min);
    let max_order = (speed_of_sound * rt60 / r_min - 1.0).ceil().max(0.0) as usize;

    Ok((absorption, max_order))
}

// ============================================================================
// Microphones
// ============================================================================

/// Directivity of a microphone capsule
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directivity {
    /// Same gain in every direction
    #[default]
    Omni,
    /// First order cardioid, angles in radians
    Cardioid {
        /// Orientation in the horizontal plane, from the x axis
        azimuth: f64,
        /// Angle from the z axis; π/2 lies in the horizontal plane
        colatitude: f64,
    },
}

impl Directivity {
    /// Cardioid oriented with angles given in degrees
    pub fn cardioid_degrees(azimuth: f64, colatitude: f64) -> Self {
        Self::Cardioid {
            azimuth: azimuth.to_radians(),
            colatitude: colatitude.to_radians(),
        }
    }

    /// Gain for a wave arriving from `direction`, a unit vector pointing from
    /// the capsule towards the (image) source
    pub fn gain(&self, direction: [f64; 3]) -> f64 {
        match *self {
            Directivity::Omni => 1.0,
            Directivity::Cardioid {
                azimuth,
                colatitude,
            } => {
                let axis = [
                    colatitude.sin() * azimuth.cos(),
                    colatitude.sin() * azimuth.sin(),
                    colatitude.cos(),
                ];
                let cos_angle: f64 = axis.iter().zip(direction.iter()).map(|(a, d)| a * d).sum();
                0.5 + 0.5 * cos_angle
            }
        }
    }
}

/// A microphone capsule placed in the room
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Microphone {
    pub position: Point3D,
    #[serde(default)]
    pub directivity: Directivity,
}

impl Microphone {
    pub fn omni(position: Point3D) -> Self {
        Self {
            position,
            directivity: Directivity::Omni,
        }
    }

    pub fn with_directivity(position: Point3D, directivity: Directivity) -> Self {
        Self {
            position,
            directivity,
        }
    }
}

// ============================================================================
// Simulator Interface
// ============================================================================

/// An engine producing impulse responses inside a shoebox room
pub trait RoomSimulator {
    /// Render one impulse response per microphone, in microphone order
    fn compute_rir(
        &self,
        room: &ShoeBox,
        source: &Point3D,
        mics: &[Microphone],
    ) -> Result<Vec<Vec<f64>>, RoomSimError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_sabine_default_room() {
        let (absorption, max_order) =
            inverse_sabine(0.5, &[7.0, 6.4, 2.7], SPEED_OF_SOUND).expect("room is valid");
        assert!((absorption - 0.240656).abs() < 1e-5, "absorption={}", absorption);
        assert_eq!(max_order, 68);
    }

    #[test]
    fn test_inverse_sabine_2d() {
        let (absorption, _) = inverse_sabine(0.3, &[4.0, 5.0], SPEED_OF_SOUND).expect("valid");
        assert!((absorption - 0.298359).abs() < 1e-5);
    }

    #[test]
    fn test_inverse_sabine_unreachable() {
        let err = inverse_sabine(0.01, &[20.0, 20.0, 10.0], SPEED_OF_SOUND).unwrap_err();
        assert!(matches!(err, RoomSimError::Rt60Unreachable { .. }));
    }

    #[test]
    fn test_inverse_sabine_round_trip() {
        let room = ShoeBox::from_rt60([7.0, 6.4, 2.7], 0.5, 48000.0, SPEED_OF_SOUND)
            .expect("room is valid");
        // 0.161 is a rounded 24 ln(10) / c
        assert!((room.rt60_sabine() - 0.5).abs() < 0.005);
    }

    #[test]
    fn test_invalid_room() {
        assert!(ShoeBox::new([7.0, 0.0, 2.7], 0.2, 1, 48000.0).is_err());
        assert!(ShoeBox::new([7.0, 6.4, 2.7], 1.2, 1, 48000.0).is_err());
        assert!(ShoeBox::new([7.0, 6.4, 2.7], 0.2, 1, 0.0).is_err());
    }

    #[test]
    fn test_cardioid_gain() {
        let cardioid = Directivity::cardioid_degrees(90.0, 90.0);
        assert!((cardioid.gain([0.0, 1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cardioid.gain([0.0, -1.0, 0.0]).abs() < 1e-12);
        assert!((cardioid.gain([1.0, 0.0, 0.0]) - 0.5).abs() < 1e-12);
        assert_eq!(Directivity::Omni.gain([0.0, -1.0, 0.0]), 1.0);
    }
}
