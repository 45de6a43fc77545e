//! Resolution of the latitude, longitude and time dimensions of a field
//!
//! Model output names its axes inconsistently (`lat` vs `latitude`, `t` vs `time`) and
//! calendar fixing upstream can leave the time axis with a generic name such as
//! `dim_0`. [`CoordinateRoles::resolve`] binds each logical role to exactly one
//! dimension or fails with [`HindexError::AmbiguousCoordinate`].

use crate::errors::{HindexError, HindexResult};
use crate::field::GriddedField;

pub const LATITUDE_NAMES: [&str; 2] = ["latitude", "lat"];
pub const LONGITUDE_NAMES: [&str; 2] = ["longitude", "lon"];
pub const TIME_NAMES: [&str; 2] = ["time", "t"];

/// Concrete dimension names bound to the spatial and temporal roles
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinateRoles {
    pub latitude: String,
    pub longitude: String,
    pub time: Option<String>,
}

/// Horizontal dimension names of a field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpatialRoles {
    pub latitude: String,
    pub longitude: String,
}

impl SpatialRoles {
    pub fn resolve(field: &GriddedField) -> HindexResult<Self> {
        let names = field.dim_names();
        Ok(Self {
            latitude: unique_match("latitude", &names, &LATITUDE_NAMES)?,
            longitude: unique_match("longitude", &names, &LONGITUDE_NAMES)?,
        })
    }

    /// Axis positions of (latitude, longitude)
    pub fn axes(&self, field: &GriddedField) -> HindexResult<(usize, usize)> {
        Ok((
            field.require_axis(&self.latitude)?,
            field.require_axis(&self.longitude)?,
        ))
    }
}

impl CoordinateRoles {
    /// Resolve latitude, longitude and (if present) time.
    ///
    /// A field with only latitude and longitude dimensions resolves with `time = None`.
    pub fn resolve(field: &GriddedField) -> HindexResult<Self> {
        let spatial = SpatialRoles::resolve(field)?;
        let names = field.dim_names();
        let remaining: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| *n != spatial.latitude && *n != spatial.longitude)
            .collect();

        let time = if remaining.is_empty() {
            None
        } else {
            Some(resolve_time_among(&names, &remaining)?)
        };

        Ok(Self {
            latitude: spatial.latitude,
            longitude: spatial.longitude,
            time,
        })
    }
}

/// Resolve the time dimension of a field whose spatial axes may already be reduced.
///
/// Exactly one synonym match wins. Without any match, the single dimension that is not
/// latitude or longitude is adopted; anything else is ambiguous.
pub fn resolve_time(field: &GriddedField) -> HindexResult<String> {
    let names = field.dim_names();
    let remaining: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !LATITUDE_NAMES.contains(n) && !LONGITUDE_NAMES.contains(n))
        .collect();
    resolve_time_among(&names, &remaining)
}

fn resolve_time_among(names: &[&str], remaining: &[&str]) -> HindexResult<String> {
    let matches: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| TIME_NAMES.contains(n))
        .collect();
    match (matches.as_slice(), remaining) {
        ([single], _) => Ok(single.to_string()),
        ([], [fallback]) => {
            log::debug!("Adopting '{}' as the time dimension", fallback);
            Ok(fallback.to_string())
        }
        _ => Err(HindexError::AmbiguousCoordinate {
            role: "time".to_string(),
            candidates: names.iter().map(|n| n.to_string()).collect(),
        }),
    }
}

fn unique_match(role: &str, names: &[&str], synonyms: &[&str]) -> HindexResult<String> {
    let matches: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| synonyms.contains(n))
        .collect();
    match matches.as_slice() {
        [single] => Ok(single.to_string()),
        _ => Err(HindexError::AmbiguousCoordinate {
            role: role.to_string(),
            candidates: names.iter().map(|n| n.to_string()).collect(),
        }),
    }
}
