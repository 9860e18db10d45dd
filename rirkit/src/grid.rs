//! Grid layout of sources and circular microphone arrays
//!
//! Positions sit on a uniform lattice over the room footprint, `margin` meters
//! away from the walls. Every grid position is in turn the source of a
//! simulation pass while all others host a microphone array.

use crate::error::{Result, RirkitError};
use rirkit_roomsim::{Directivity, Microphone, Point3D};
use std::f64::consts::PI;

/// Uniform lattice over the room footprint at a fixed height
#[derive(Debug, Clone, PartialEq)]
pub struct GridSpec {
    /// Room extent along x (m)
    pub width: f64,
    /// Room extent along y (m)
    pub depth: f64,
    pub num_x: usize,
    pub num_y: usize,
    /// Distance from the walls to the outermost positions (m)
    pub margin: f64,
    /// Height of every position (m)
    pub height: f64,
}

impl GridSpec {
    /// Distance between neighbouring positions along x and y
    pub fn spacing(&self) -> Result<(f64, f64)> {
        for (axis, count) in [("x", self.num_x), ("y", self.num_y)] {
            if count < 2 {
                return Err(RirkitError::InvalidGridCount { axis, count });
            }
        }
        Ok((
            (self.width - 2.0 * self.margin) / (self.num_x - 1) as f64,
            (self.depth - 2.0 * self.margin) / (self.num_y - 1) as f64,
        ))
    }

    /// Arrays on neighbouring positions must not overlap
    pub fn check_mic_radius(&self, radius: f64) -> Result<()> {
        let (spacing_x, spacing_y) = self.spacing()?;
        for (axis, spacing) in [("x", spacing_x), ("y", spacing_y)] {
            if radius >= spacing {
                return Err(RirkitError::MicRadiusTooLarge {
                    radius,
                    axis,
                    spacing,
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.num_x * self.num_y
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All positions, x major: index `ix * num_y + iy`
    pub fn positions(&self) -> Result<Vec<Point3D>> {
        let (spacing_x, spacing_y) = self.spacing()?;
        let mut positions = Vec::with_capacity(self.len());
        for ix in 0..self.num_x {
            let x = self.margin + spacing_x * ix as f64;
            for iy in 0..self.num_y {
                let y = self.margin + spacing_y * iy as f64;
                positions.push(Point3D::new(x, y, self.height));
            }
        }
        Ok(positions)
    }
}

/// Points evenly spaced on a circle, starting at angle `phi0` (radians)
pub fn circular_2d_array(center: [f64; 2], count: usize, phi0: f64, radius: f64) -> Vec<[f64; 2]> {
    (0..count)
        .map(|k| {
            let phi = 2.0 * PI * k as f64 / count as f64 + phi0;
            [center[0] + radius * phi.cos(), center[1] + radius * phi.sin()]
        })
        .collect()
}

/// Circular array in the horizontal plane of `center`
///
/// With `directivity` set, capsule `i` is a cardioid facing outwards at
/// azimuth `360 / count * i` degrees.
pub fn mic_array(center: &Point3D, count: usize, radius: f64, directivity: bool) -> Vec<Microphone> {
    circular_2d_array([center.x, center.y], count, 0.0, radius)
        .into_iter()
        .enumerate()
        .map(|(i, [x, y])| {
            let position = Point3D::new(x, y, center.z);
            if directivity {
                let azimuth = 360.0 / count as f64 * i as f64;
                Microphone::with_directivity(position, Directivity::cardioid_degrees(azimuth, 90.0))
            } else {
                Microphone::omni(position)
            }
        })
        .collect()
}
