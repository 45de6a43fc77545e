//! Spatial extraction over latitude/longitude boxes
//!
//! This module provides the reductions used to turn a gridded field into a climate index:
//!
//! - [`spatial_mean`]: area-weighted mean over a [`BoundingBox`], keeping every other axis
//! - [`spatial_subset`]: the cells inside a box, without reduction
//! - [`nearest_point`]: the single grid cell closest to a location
//!
//! Cell areas on the sphere are proportional to
//! $$ \Delta\lambda \cdot (\sin\phi_{upper} - \sin\phi_{lower}) $$
//! computed from the coordinate bounds (guessed by bisection when absent).
//!
//! # Examples
//!
//! ```rust
//! use hindex_core::field::{Coordinate, GriddedField};
//! use hindex_core::spatial::{spatial_mean, BoundingBox};
//! use ndarray::{Array1, ArrayD, IxDyn};
//!
//! let field = GriddedField::new(
//!     "tos",
//!     ArrayD::from_elem(IxDyn(&[3, 4]), 15.0),
//!     vec![
//!         Coordinate::new("lat", Array1::from(vec![-5.0, 0.0, 5.0])),
//!         Coordinate::new("lon", Array1::from(vec![0.0, 90.0, 200.0, 270.0])),
//!     ],
//! )
//! .unwrap();
//!
//! let nino = BoundingBox::new(-170.0, -120.0, -5.0, 5.0);
//! let mean = spatial_mean(&field, &nino).unwrap();
//! assert!((mean.as_scalar().unwrap() - 15.0).abs() < 1e-12);
//! ```

use crate::coords::SpatialRoles;
use crate::errors::{HindexError, HindexResult};
use crate::field::{Coordinate, GriddedField};
use crate::longitude::{angular_distance, floor_mod, has_positive_longitude, LongitudeSpan};
use ndarray::{Array1, Array2, Axis};
use num::Float;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed latitude/longitude rectangle in signed degrees.
///
/// `lon_min` is the western edge and `lon_max` the eastern edge; a box with
/// `lon_min > lon_max` wraps eastward across the antimeridian.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    pub const fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        }
    }

    /// The whole sphere
    pub const fn global() -> Self {
        Self::new(-180.0, 180.0, -90.0, 90.0)
    }

    /// Whether a latitude cell with edges `a` and `b` overlaps the box, touching edges
    /// included
    pub fn overlaps_latitude(&self, a: f64, b: f64) -> bool {
        a.min(b) <= self.lat_max && a.max(b) >= self.lat_min
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(lon {}..{}, lat {}..{})",
            self.lon_min, self.lon_max, self.lat_min, self.lat_max
        )
    }
}

/// Grid positions of the cells inside a box
#[derive(Clone, Debug)]
struct Selection {
    roles: SpatialRoles,
    lat_axis: usize,
    lon_axis: usize,
    lat_indices: Vec<usize>,
    lon_indices: Vec<usize>,
}

impl Selection {
    /// Subset of `field`, with the spatial coordinates carrying their full-grid bounds
    fn apply(&self, field: &GriddedField) -> HindexResult<GriddedField> {
        let mut field = field.clone();
        for name in [&self.roles.latitude, &self.roles.longitude] {
            if let Some(coord) = field.coord_mut(name) {
                coord.bounds = Some(coord.bounds_or_guess());
            }
        }
        field
            .select(&self.roles.latitude, &self.lat_indices)?
            .select(&self.roles.longitude, &self.lon_indices)
    }
}

fn select_box(field: &GriddedField, bbox: &BoundingBox) -> HindexResult<Selection> {
    let roles = SpatialRoles::resolve(field)?;
    let (lat_axis, lon_axis) = roles.axes(field)?;
    let lat = &field.dims()[lat_axis];
    let lon = &field.dims()[lon_axis];

    let span = LongitudeSpan::new(
        bbox.lon_min,
        bbox.lon_max,
        has_positive_longitude(&lon.values.to_vec()),
    );
    let lon_cells: Vec<(f64, f64)> = lon
        .bounds_or_guess()
        .outer_iter()
        .map(|b| (b[0], b[1]))
        .collect();
    let lon_indices = span.select_cells(&lon_cells);
    let lat_indices: Vec<usize> = lat
        .bounds_or_guess()
        .outer_iter()
        .enumerate()
        .filter(|(_, b)| bbox.overlaps_latitude(b[0], b[1]))
        .map(|(i, _)| i)
        .collect();

    if lat_indices.is_empty() || lon_indices.is_empty() {
        return Err(HindexError::EmptySelection(bbox.to_string()));
    }
    log::debug!(
        "Box {} selects {} latitudes x {} longitudes of {}",
        bbox,
        lat_indices.len(),
        lon_indices.len(),
        field.name
    );

    Ok(Selection {
        roles,
        lat_axis,
        lon_axis,
        lat_indices,
        lon_indices,
    })
}

/// Relative cell areas on a unit sphere for the given latitude and longitude
/// coordinates, shaped `(nlat, nlon)`.
///
/// Latitude bounds are clipped to the poles.
pub fn area_weights(lat: &Coordinate, lon: &Coordinate) -> Array2<f64> {
    let lat_bounds = lat.bounds_or_guess();
    let lon_bounds = lon.bounds_or_guess();

    let lat_factor: Array1<f64> = lat_bounds
        .outer_iter()
        .map(|b| {
            let lower = b[0].clamp(-90.0, 90.0).to_radians();
            let upper = b[1].clamp(-90.0, 90.0).to_radians();
            (upper.sin() - lower.sin()).abs()
        })
        .collect();
    let lon_factor: Array1<f64> = lon_bounds
        .outer_iter()
        .map(|b| (b[1] - b[0]).abs().to_radians())
        .collect();

    let mut weights = Array2::zeros((lat_factor.len(), lon_factor.len()));
    for ((i, j), w) in weights.indexed_iter_mut() {
        *w = lat_factor[i] * lon_factor[j];
    }
    weights
}

/// Weighted mean ignoring NaN entries; NaN if no entry is valid
fn weighted_nanmean<F: Float>(
    values: impl Iterator<Item = F>,
    weights: impl Iterator<Item = F>,
) -> F {
    let (sum, total) = values
        .zip(weights)
        .filter(|(v, _)| !v.is_nan())
        .fold((F::zero(), F::zero()), |(s, t), (v, w)| (s + v * w, t + w));
    if total > F::zero() {
        sum / total
    } else {
        F::nan()
    }
}

/// Area-weighted mean over a box, collapsing latitude and longitude.
///
/// Every cell whose bounds overlap the box is kept and weighted by its full area. All
/// other dimensions (typically time) are preserved. NaN cells are treated as
/// missing and do not contribute to the weights.
pub fn spatial_mean(field: &GriddedField, bbox: &BoundingBox) -> HindexResult<GriddedField> {
    let selection = select_box(field, bbox)?;
    // Weights come from the full grid so edge cells keep their true width
    let weights = area_weights(
        &field.dims()[selection.lat_axis],
        &field.dims()[selection.lon_axis],
    )
    .select(Axis(0), &selection.lat_indices)
    .select(Axis(1), &selection.lon_indices);

    let subset = selection.apply(field)?;
    let (blocks, _) = subset.spatial_blocks(selection.lat_axis, selection.lon_axis)?;
    let reduced: Array1<f64> = blocks
        .outer_iter()
        .map(|block| weighted_nanmean(block.iter().copied(), weights.iter().copied()))
        .collect();

    subset.from_reduced_blocks(reduced, selection.lat_axis, selection.lon_axis)
}

/// The cells of a field overlapping a box, keeping all axes.
///
/// Longitude order follows the grid; a wrapping box keeps the grid's own ordering. The
/// kept spatial coordinates store their full-grid bounds.
pub fn spatial_subset(field: &GriddedField, bbox: &BoundingBox) -> HindexResult<GriddedField> {
    select_box(field, bbox)?.apply(field)
}

/// The grid cell nearest to `(lon, lat)`, removing both spatial axes.
///
/// `lon` is given in signed degrees and folded into the grid's convention; distance in
/// longitude is measured around the circle.
pub fn nearest_point(field: &GriddedField, lon: f64, lat: f64) -> HindexResult<GriddedField> {
    let roles = SpatialRoles::resolve(field)?;
    let (lat_axis, lon_axis) = roles.axes(field)?;
    let lat_values = &field.dims()[lat_axis].values;
    let lon_values = &field.dims()[lon_axis].values;

    let target_lon = if has_positive_longitude(&lon_values.to_vec()) {
        floor_mod(lon, 360.0)
    } else {
        lon
    };
    let lat_index = argmin(lat_values.iter().map(|v| (v - lat).abs()))
        .ok_or_else(|| HindexError::EmptySelection(format!("latitude {}", lat)))?;
    let lon_index = argmin(lon_values.iter().map(|v| angular_distance(*v, target_lon)))
        .ok_or_else(|| HindexError::EmptySelection(format!("longitude {}", lon)))?;

    log::debug!(
        "Nearest point to ({}, {}) is ({}, {})",
        lon,
        lat,
        lon_values[lon_index],
        lat_values[lat_index]
    );

    // Index the higher axis first so the lower axis position stays valid
    let (first, second) = if lat_axis > lon_axis {
        ((&roles.latitude, lat_index), (&roles.longitude, lon_index))
    } else {
        ((&roles.longitude, lon_index), (&roles.latitude, lat_index))
    };
    field.index_dim(first.0, first.1)?.index_dim(second.0, second.1)
}

fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    values
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetGrid;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array, ArrayD, IxDyn};

    /// 5 degree global grid in the 0..360 convention with a time axis of length 2
    fn global_field(value: impl Fn(f64, f64) -> f64) -> GriddedField {
        let lat = Coordinate::regular("lat", -87.5, 87.5, 5.0).unwrap();
        let lon = Coordinate::regular("lon", 2.5, 357.5, 5.0).unwrap();
        let time = Coordinate::new("time", Array::from(vec![0.0, 1.0]));
        let data = ArrayD::from_shape_fn(IxDyn(&[2, lat.len(), lon.len()]), |idx| {
            value(lat.values[idx[1]], lon.values[idx[2]]) + idx[0] as f64
        });
        GriddedField::new("tas", data, vec![time, lat, lon]).unwrap()
    }

    #[test]
    fn uniform_field_mean_is_the_value_for_any_box() {
        let field = global_field(|_, _| 3.0);
        for bbox in [
            BoundingBox::new(-28.0, -20.0, 36.0, 40.0),
            BoundingBox::new(-80.0, 0.0, 0.0, 60.0),
            BoundingBox::new(160.0, -150.0, -5.0, 5.0),
            BoundingBox::new(-180.0, 180.0, -60.0, 60.0),
            BoundingBox::global(),
        ] {
            let mean = spatial_mean(&field, &bbox).unwrap();
            assert_eq!(mean.dim_names(), vec!["time"]);
            assert_abs_diff_eq!(mean.data()[[0]], 3.0, epsilon = 1e-12);
            assert_abs_diff_eq!(mean.data()[[1]], 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn area_weights_favour_low_latitudes() {
        let lat = Coordinate::new("lat", Array::from(vec![0.0, 60.0]));
        let lon = Coordinate::new("lon", Array::from(vec![0.0, 10.0]));
        let weights = area_weights(&lat, &lon);
        assert!(weights[[0, 0]] > weights[[1, 0]]);
        assert_abs_diff_eq!(weights[[0, 0]], weights[[0, 1]]);
    }

    #[test]
    fn area_weights_of_global_grid_cover_the_sphere() {
        let lat = Coordinate::regular("lat", 90.0, -90.0, -5.0).unwrap();
        let lon = Coordinate::regular("lon", 0.0, 355.0, 5.0).unwrap();
        let total: f64 = area_weights(&lat, &lon).sum();
        assert_abs_diff_eq!(total, 4.0 * std::f64::consts::PI, epsilon = 1e-9);
    }

    #[test]
    fn weighted_mean_follows_latitude_weights() {
        // value = 1 in the northern row, 0 in the southern row
        let field = GriddedField::new(
            "x",
            ndarray::array![[0.0, 0.0], [1.0, 1.0]].into_dyn(),
            vec![
                Coordinate::new("lat", Array::from(vec![0.0, 60.0])),
                Coordinate::new("lon", Array::from(vec![0.0, 10.0])),
            ],
        )
        .unwrap();
        let mean = spatial_mean(&field, &BoundingBox::global()).unwrap();
        let weights = area_weights(&field.dims()[0], &field.dims()[1]);
        let expected = weights[[1, 0]] / (weights[[0, 0]] + weights[[1, 0]]);
        assert_abs_diff_eq!(mean.as_scalar().unwrap(), expected, epsilon = 1e-12);
        assert!(expected < 0.5);
    }

    #[test]
    fn nan_cells_are_skipped() {
        let field = GriddedField::new(
            "tos",
            ndarray::array![[f64::NAN, 2.0], [2.0, 2.0]].into_dyn(),
            vec![
                Coordinate::new("lat", Array::from(vec![-1.0, 1.0])),
                Coordinate::new("lon", Array::from(vec![0.0, 1.0])),
            ],
        )
        .unwrap();
        let mean = spatial_mean(&field, &BoundingBox::global()).unwrap();
        assert_abs_diff_eq!(mean.as_scalar().unwrap(), 2.0);
    }

    #[test]
    fn empty_box_is_an_error() {
        let europe = spatial_subset(
            &global_field(|_, _| 1.0),
            &BoundingBox::new(-10.0, 30.0, 40.0, 60.0),
        )
        .unwrap();
        let result = spatial_mean(&europe, &BoundingBox::new(100.0, 120.0, -10.0, 10.0));
        assert!(matches!(result, Err(HindexError::EmptySelection(_))));
    }

    #[test]
    fn subset_keeps_axes_and_drops_outside_cells() {
        let field = global_field(|lat, lon| lat * 1000.0 + lon);
        let subset = spatial_subset(&field, &BoundingBox::new(-10.0, 10.0, 50.0, 60.0)).unwrap();
        assert_eq!(subset.dim_names(), vec!["time", "lat", "lon"]);
        // Cells whose edges touch the box are kept
        assert_eq!(subset.shape(), &[2, 4, 6]);
        assert_eq!(
            subset.coord("lon").unwrap().values.to_vec(),
            vec![2.5, 7.5, 12.5, 347.5, 352.5, 357.5]
        );
        assert_eq!(
            subset.coord("lat").unwrap().values.to_vec(),
            vec![47.5, 52.5, 57.5, 62.5]
        );
    }

    #[test]
    fn cells_partly_inside_the_box_are_selected() {
        let template = TargetGrid::default().template().unwrap();
        let subset =
            spatial_subset(&template, &BoundingBox::new(-28.0, -20.0, 36.0, 40.0)).unwrap();
        assert_eq!(subset.coord("latitude").unwrap().values.to_vec(), vec![40.0, 35.0]);
        assert_eq!(
            subset.coord("longitude").unwrap().values.to_vec(),
            vec![330.0, 335.0, 340.0]
        );
    }

    #[test]
    fn box_narrower_than_a_cell_selects_the_cells_it_touches() {
        let template = TargetGrid::default().template().unwrap();
        let subset =
            spatial_subset(&template, &BoundingBox::new(-28.0, -20.0, 36.0, 39.0)).unwrap();
        assert_eq!(subset.coord("latitude").unwrap().values.to_vec(), vec![40.0, 35.0]);

        let point_box = BoundingBox::new(331.0, 332.0, 36.0, 36.5);
        let mean = spatial_mean(&template, &point_box).unwrap();
        assert_abs_diff_eq!(mean.as_scalar().unwrap(), 0.0);
    }

    #[test]
    fn edge_cells_carry_full_area_weight() {
        // Both rows straddle a box edge
        let lon = Coordinate::new("lon", Array::from(vec![0.0]))
            .with_bounds(ndarray::array![[-5.0, 5.0]]);
        let field = GriddedField::new(
            "x",
            ndarray::array![[1.0], [3.0]].into_dyn(),
            vec![Coordinate::new("lat", Array::from(vec![0.0, 10.0])), lon],
        )
        .unwrap();
        let mean = spatial_mean(&field, &BoundingBox::new(-5.0, 5.0, 4.0, 6.0)).unwrap();
        let weights = area_weights(&field.dims()[0], &field.dims()[1]);
        let expected =
            (weights[[0, 0]] + 3.0 * weights[[1, 0]]) / (weights[[0, 0]] + weights[[1, 0]]);
        assert_abs_diff_eq!(mean.as_scalar().unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn subset_of_wrapping_box_keeps_true_bounds() {
        let field = global_field(|_, _| 1.0);
        let subset = spatial_subset(&field, &BoundingBox::new(-10.0, 10.0, 50.0, 60.0)).unwrap();
        let bounds = subset.coord("lon").unwrap().bounds.clone().unwrap();
        assert_eq!(bounds.row(2).to_vec(), vec![10.0, 15.0]);
        assert_eq!(bounds.row(3).to_vec(), vec![345.0, 350.0]);
    }

    #[test]
    fn nearest_point_folds_longitude() {
        let field = global_field(|lat, lon| lat * 1000.0 + lon);
        let ea = nearest_point(&field, -27.5, 52.5).unwrap();
        assert_eq!(ea.dim_names(), vec!["time"]);
        assert_abs_diff_eq!(ea.data()[[0]], 52.5 * 1000.0 + 332.5);

        // 359 is nearest to 357.5 going around the circle, not to 2.5
        let wrapped = nearest_point(&field, -1.0, 1.0).unwrap();
        assert_abs_diff_eq!(wrapped.data()[[0]], 2.5 * 1000.0 + 357.5);
    }

    #[test]
    fn nearest_point_handles_lon_before_lat() {
        let field = GriddedField::new(
            "psl",
            ndarray::array![[1.0, 2.0], [3.0, 4.0]].into_dyn(),
            vec![
                Coordinate::new("lon", Array::from(vec![0.0, 180.0])),
                Coordinate::new("lat", Array::from(vec![-45.0, 45.0])),
            ],
        )
        .unwrap();
        let point = nearest_point(&field, 170.0, 40.0).unwrap();
        assert_eq!(point.as_scalar(), Some(4.0));
    }
}
