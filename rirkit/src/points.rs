//! Coordinate table and room bounding box files
//!
//! The coordinate table is plain text, one `index\tx\ty\tz` line per grid
//! position. Its indices define the key space of every downstream archive.

use crate::error::{Result, RirkitError};
use rirkit_roomsim::Point3D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// One row of the coordinate table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateRecord {
    pub index: usize,
    pub position: Point3D,
}

/// Coordinate table keyed by grid index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinateTable {
    rows: BTreeMap<usize, Point3D>,
}

impl CoordinateTable {
    /// Table whose indices are the positions' order
    pub fn from_positions(positions: &[Point3D]) -> Self {
        Self {
            rows: positions.iter().copied().enumerate().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point3D> {
        self.rows.get(&index)
    }

    pub fn records(&self) -> impl Iterator<Item = CoordinateRecord> + '_ {
        self.rows.iter().map(|(&index, &position)| CoordinateRecord { index, position })
    }

    /// Parse the tab-separated table; indices must be unique
    pub fn parse(content: &str) -> Result<Self> {
        let mut rows = BTreeMap::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || RirkitError::MalformedCoordinate {
                line: n + 1,
                content: line.to_string(),
            };
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            let [index, x, y, z] = fields.as_slice() else {
                return Err(malformed());
            };
            let index: usize = index.parse().map_err(|_| malformed())?;
            let coord = |s: &str| s.parse::<f64>().map_err(|_| malformed());
            let position = Point3D::new(coord(x)?, coord(y)?, coord(z)?);
            if rows.insert(index, position).is_some() {
                return Err(malformed());
            }
        }
        Ok(Self { rows })
    }

    /// Render the table; floats keep a decimal point (`3.0`, not `3`)
    pub fn format(&self) -> String {
        let mut out = String::new();
        for CoordinateRecord { index, position } in self.records() {
            let _ = writeln!(
                out,
                "{}\t{:?}\t{:?}\t{:?}",
                index, position.x, position.y, position.z
            );
        }
        out
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RirkitError::file_operation(path, e))?;
        Self::parse(&content)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.format()).map_err(|e| RirkitError::file_operation(path, e))
    }
}

/// Envelope of the room, serialized as `[[min...], [max...]]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox(pub [f32; 3], pub [f32; 3]);

impl BoundingBox {
    /// Box spanning the origin to the room's far corner
    pub fn for_room(dims: [f64; 3]) -> Self {
        Self([0.0; 3], dims.map(|d| d as f32))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| RirkitError::file_operation(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).map_err(|e| RirkitError::file_operation(path, e))
    }
}
