//! Bilinear regridding onto a reference latitude/longitude grid
//!
//! Model output arrives on native grids of differing resolution. Before indices from
//! several models can be compared the fields are resampled onto one reference grid,
//! usually [`TargetGrid`](crate::config::TargetGrid).
//!
//! Spatial coordinates of the result are the target's, so the source's dimension names
//! and coordinate system are replaced by the target's. Latitude outside the source range
//! is extrapolated linearly; longitude wraps when the source covers the whole globe.

use crate::coords::SpatialRoles;
use crate::errors::{HindexError, HindexResult};
use crate::field::{Coordinate, GriddedField};
use crate::interpolate::{bilin_interp, linear_stencil, periodic_stencil, Stencil};
use crate::longitude::{floor_mod, has_positive_longitude};
use ndarray::Array3;

const FULL_CIRCLE: f64 = 360.0;
const PERIODIC_TOLERANCE: f64 = 1e-6;

/// Regrid `source` onto the horizontal grid of `target`.
///
/// Only the target's latitude and longitude coordinates are used; its data is ignored.
pub fn regrid(source: &GriddedField, target: &GriddedField) -> HindexResult<GriddedField> {
    let roles = SpatialRoles::resolve(target)?;
    let lat = target.coord(&roles.latitude);
    let lon = target.coord(&roles.longitude);
    match (lat, lon) {
        (Some(lat), Some(lon)) => regrid_onto(source, lat, lon),
        _ => Err(incompatible(source, target, "target has no horizontal grid")),
    }
}

/// Regrid `source` onto explicit target latitude and longitude coordinates
pub fn regrid_onto(
    source: &GriddedField,
    target_lat: &Coordinate,
    target_lon: &Coordinate,
) -> HindexResult<GriddedField> {
    let roles = SpatialRoles::resolve(source)?;
    let (lat_axis, lon_axis) = roles.axes(source)?;
    let source_lat = &source.dims()[lat_axis];
    let source_lon = &source.dims()[lon_axis];
    let target_desc = format!(
        "{}({}) x {}({})",
        target_lat.name,
        target_lat.len(),
        target_lon.name,
        target_lon.len()
    );
    let fail = |reason: &str| HindexError::RegridIncompatibleGrid {
        source_grid: describe(source),
        target_grid: target_desc.clone(),
        reason: reason.to_string(),
    };

    for coord in [source_lat, source_lon, target_lat, target_lon] {
        if let Some(cs) = &coord.coord_system {
            if !cs.is_geographic() {
                return Err(fail(&format!("'{}' uses projected system {}", coord.name, cs)));
            }
        }
        if coord.len() < 2 {
            return Err(fail(&format!("'{}' has fewer than two points", coord.name)));
        }
        if !coord.is_monotonic() {
            return Err(fail(&format!("'{}' is not monotonic", coord.name)));
        }
    }

    let source_lat_values = source_lat.values.to_vec();
    let source_lon_values = source_lon.values.to_vec();
    let periodic = is_global(source_lon);
    if periodic && source_lon_values[1] < source_lon_values[0] {
        return Err(fail("global longitude must be ascending"));
    }

    let lat_stencils: Vec<Stencil> = target_lat
        .values
        .iter()
        .map(|y| linear_stencil(&source_lat_values, *y))
        .collect();
    let positive = has_positive_longitude(&source_lon_values);
    let lon_stencils: Vec<Stencil> = target_lon
        .values
        .iter()
        .map(|x| {
            if periodic {
                periodic_stencil(&source_lon_values, *x, FULL_CIRCLE)
            } else {
                linear_stencil(&source_lon_values, to_convention(*x, positive))
            }
        })
        .collect();

    log::debug!(
        "Regridding {} from {} onto {} (periodic longitude: {})",
        source.name,
        describe(source),
        target_desc,
        periodic
    );

    let (blocks, order) = source.spatial_blocks(lat_axis, lon_axis)?;
    let mut regridded = Array3::zeros((blocks.dim().0, lat_stencils.len(), lon_stencils.len()));
    for (block, mut out) in blocks.outer_iter().zip(regridded.outer_iter_mut()) {
        for (i, sy) in lat_stencils.iter().enumerate() {
            for (j, sx) in lon_stencils.iter().enumerate() {
                out[[i, j]] = bilin_interp(
                    block[[sy.lo, sx.lo]],
                    block[[sy.lo, sx.hi]],
                    block[[sy.hi, sx.lo]],
                    block[[sy.hi, sx.hi]],
                    sy.fac,
                    sx.fac,
                );
            }
        }
    }

    let lat = adopt(target_lat, source_lat);
    let lon = adopt(target_lon, source_lon);
    source.from_spatial_blocks(regridded, &order, lat, lon, lat_axis, lon_axis)
}

/// Target coordinate carrying the source's system when the target has none
fn adopt(target: &Coordinate, source: &Coordinate) -> Coordinate {
    let mut coord = target.clone();
    if coord.coord_system.is_none() {
        coord.coord_system = source.coord_system.clone();
    }
    if coord.units.is_none() {
        coord.units = source.units.clone();
    }
    coord
}

/// Whether the longitude cells cover the full circle
fn is_global(lon: &Coordinate) -> bool {
    let (lower, upper) = lon
        .bounds_or_guess()
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    (upper - lower - FULL_CIRCLE).abs() < PERIODIC_TOLERANCE
}

fn to_convention(lon: f64, positive: bool) -> f64 {
    if positive {
        floor_mod(lon, FULL_CIRCLE)
    } else if lon > 180.0 {
        lon - FULL_CIRCLE
    } else {
        lon
    }
}

fn describe(field: &GriddedField) -> String {
    let dims: Vec<String> = field
        .dims()
        .iter()
        .map(|c| format!("{}({})", c.name, c.len()))
        .collect();
    format!("{} [{}]", field.name, dims.join(" x "))
}

fn incompatible(source: &GriddedField, target: &GriddedField, reason: &str) -> HindexError {
    HindexError::RegridIncompatibleGrid {
        source_grid: describe(source),
        target_grid: describe(target),
        reason: reason.to_string(),
    }
}
