//! rirkit - Room impulse response datasets and acoustic field evaluation
//! Common command-line interface definitions shared across binaries
//!
//! Copyright (C) 2025 Pierre Aubert pierre(at)spinorama(dot)org
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::error::{Result, RirkitError};
use clap::ValueEnum;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Units of the angular errors reported by the DoA evaluator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorUnits {
    /// Grid index of the estimate compared directly with the bearing in degrees
    #[default]
    #[value(name = "index")]
    Index,
    /// Grid index converted to degrees (index * 360 / n_grid) before comparison
    #[value(name = "degrees")]
    Degrees,
}

impl fmt::Display for ErrorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorUnits::Index => write!(f, "index"),
            ErrorUnits::Degrees => write!(f, "degrees"),
        }
    }
}

/// Distance between network and ground-truth spectra
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SpectralMetric {
    /// Mean absolute difference
    #[default]
    #[value(name = "mae")]
    Mae,
    /// Mean squared difference
    #[value(name = "mse")]
    Mse,
}

impl fmt::Display for SpectralMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpectralMetric::Mae => write!(f, "mae"),
            SpectralMetric::Mse => write!(f, "mse"),
        }
    }
}

/// Load a JSON configuration file, or the defaults when no path is given
pub fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let json =
        std::fs::read_to_string(path).map_err(|e| RirkitError::file_operation(path, e))?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;

    #[test]
    fn test_load_config_defaults_without_path() {
        let config: SimulationConfig = load_config(None).expect("defaults always load");
        assert_eq!(config.grid_x, 13);
    }

    #[test]
    fn test_load_config_partial_json() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("sim.json");
        std::fs::write(&path, r#"{ "grid_x": 3, "rt60": 0.3 }"#).expect("write config");
        let config: SimulationConfig = load_config(Some(&path)).expect("config parses");
        assert_eq!(config.grid_x, 3);
        assert_eq!(config.grid_y, 13);
        assert_eq!(config.rt60, 0.3);
    }

    #[test]
    fn test_missing_config_is_io_error() {
        let err = load_config::<SimulationConfig>(Some(Path::new("/nonexistent/sim.json")))
            .unwrap_err();
        assert!(err.is_io_error());
    }
}
