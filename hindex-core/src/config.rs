//! Diagnostic configuration
//!
//! Every field has a default, so an empty document is a valid configuration for the
//! NAO over the extended winter at lead times 2 to 9 on a 5° grid.
//!
//! ```rust
//! use hindex_core::config::DiagnosticConfig;
//!
//! let config = DiagnosticConfig::from_toml_str(
//!     r#"
//!     index = "uk_precip"
//!     variables = ["PRECC", "PRECL"]
//!     scale_factor = 1000.0
//!
//!     [lead_time]
//!     start = 1
//!     end = 5
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.lead_time.end, 5);
//! assert_eq!(config.season.name(), "sondjfm");
//! ```

use crate::errors::{HindexError, HindexResult};
use crate::field::{Coordinate, CoordSystem, GriddedField};
use crate::lead_time::LeadTimeWindow;
use crate::season::SeasonDefinition;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Earth radius used for the reference grid's coordinate system, in metres
pub const EARTH_RADIUS: f64 = 6_371_229.0;

/// Regular latitude/longitude reference grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGrid {
    pub lon_start: f64,
    pub lon_end: f64,
    pub lon_step: f64,
    pub lat_start: f64,
    pub lat_end: f64,
    pub lat_step: f64,
}

impl Default for TargetGrid {
    fn default() -> Self {
        Self {
            lon_start: 0.0,
            lon_end: 355.0,
            lon_step: 5.0,
            lat_start: 90.0,
            lat_end: -90.0,
            lat_step: -5.0,
        }
    }
}

impl TargetGrid {
    pub fn latitude(&self) -> HindexResult<Coordinate> {
        Ok(
            Coordinate::regular("latitude", self.lat_start, self.lat_end, self.lat_step)?
                .with_units("degrees_north")
                .with_coord_system(CoordSystem::spherical(EARTH_RADIUS)),
        )
    }

    pub fn longitude(&self) -> HindexResult<Coordinate> {
        Ok(
            Coordinate::regular("longitude", self.lon_start, self.lon_end, self.lon_step)?
                .with_units("degrees_east")
                .with_coord_system(CoordSystem::spherical(EARTH_RADIUS)),
        )
    }

    /// An all-zero field on the grid, usable as a regridding target
    pub fn template(&self) -> HindexResult<GriddedField> {
        let lat = self.latitude()?;
        let lon = self.longitude()?;
        let shape = [lat.len(), lon.len()];
        GriddedField::new("template", ArrayD::zeros(IxDyn(&shape)), vec![lat, lon])
    }

    pub fn validate(&self) -> HindexResult<()> {
        self.latitude()?;
        self.longitude()?;
        if self.lat_start.abs() > 90.0 || self.lat_end.abs() > 90.0 {
            return Err(HindexError::InvalidConfig(format!(
                "latitude range {}..{} leaves [-90, 90]",
                self.lat_start, self.lat_end
            )));
        }
        Ok(())
    }
}

/// Settings for one diagnostic run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    /// Index identifier, looked up case-insensitively
    pub index: String,
    pub season: SeasonDefinition,
    /// Regrid onto `target_grid` before extracting the index
    pub regrid: bool,
    /// Variables summed into one field before extraction; empty means the single
    /// input variable is used as is
    pub variables: Vec<String>,
    /// Applied to the final value, e.g. 1000 to turn m/s into mm/s
    pub scale_factor: f64,
    pub lead_time: LeadTimeWindow,
    pub target_grid: TargetGrid,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            index: "nao".to_string(),
            season: SeasonDefinition::default(),
            regrid: true,
            variables: vec![],
            scale_factor: 1.0,
            lead_time: LeadTimeWindow::default(),
            target_grid: TargetGrid::default(),
        }
    }
}

impl DiagnosticConfig {
    pub fn from_toml_str(contents: &str) -> HindexResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> HindexResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> HindexResult<()> {
        if self.index.trim().is_empty() {
            return Err(HindexError::InvalidConfig("no index given".to_string()));
        }
        if !self.scale_factor.is_finite() {
            return Err(HindexError::InvalidConfig(format!(
                "scale factor {} is not finite",
                self.scale_factor
            )));
        }
        self.lead_time.validate()?;
        self.target_grid.validate()
    }
}
