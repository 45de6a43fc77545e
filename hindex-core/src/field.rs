//! Gridded fields with named dimensions
//!
//! A [`GriddedField`] is an N-dimensional array of physical values where every axis is
//! described by a [`Coordinate`]. Missing values are stored as NaN.
//!
//! ```rust
//! use hindex_core::field::{Coordinate, GriddedField};
//! use ndarray::{Array1, ArrayD, IxDyn};
//!
//! let field = GriddedField::new(
//!     "psl",
//!     ArrayD::from_elem(IxDyn(&[2, 3]), 101325.0),
//!     vec![
//!         Coordinate::new("lat", Array1::from(vec![-5.0, 5.0])),
//!         Coordinate::new("lon", Array1::from(vec![0.0, 120.0, 240.0])),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(field.dim_names(), vec!["lat", "lon"]);
//! assert_eq!(field.shape(), &[2, 3]);
//! ```

use crate::calendar::{Calendar, CalendarDate, TimeUnits, YearMonth};
use crate::errors::{HindexError, HindexResult};
use ndarray::{Array1, Array2, Array3, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system attached to a spatial coordinate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CoordSystem {
    /// Unprojected latitude/longitude on a sphere or ellipsoid
    Geographic {
        semi_major_axis: f64,
        semi_minor_axis: f64,
    },
    /// Any projected or rotated system
    Projected { name: String },
}

impl CoordSystem {
    pub fn spherical(radius: f64) -> Self {
        CoordSystem::Geographic {
            semi_major_axis: radius,
            semi_minor_axis: radius,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, CoordSystem::Geographic { .. })
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordSystem::Geographic {
                semi_major_axis,
                semi_minor_axis,
            } => write!(f, "GeogCS({}, {})", semi_major_axis, semi_minor_axis),
            CoordSystem::Projected { name } => write!(f, "{}", name),
        }
    }
}

/// One-dimensional coordinate describing an axis of a [`GriddedField`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub name: String,
    pub values: Array1<f64>,
    /// Cell boundaries with shape `(n, 2)`
    pub bounds: Option<Array2<f64>>,
    pub units: Option<String>,
    pub calendar: Option<Calendar>,
    pub coord_system: Option<CoordSystem>,
}

impl Coordinate {
    pub fn new(name: &str, values: Array1<f64>) -> Self {
        Self {
            name: name.to_string(),
            values,
            bounds: None,
            units: None,
            calendar: None,
            coord_system: None,
        }
    }

    /// Evenly spaced coordinate including both end points
    pub fn regular(name: &str, start: f64, end: f64, step: f64) -> HindexResult<Self> {
        if step == 0.0 || (end - start) * step < 0.0 {
            return Err(HindexError::InvalidConfig(format!(
                "cannot step from {} to {} by {}",
                start, end, step
            )));
        }
        let count = ((end - start) / step + 1e-9).floor() as usize + 1;
        let values = Array1::from_iter((0..count).map(|i| start + step * i as f64));
        Ok(Self::new(name, values))
    }

    /// Monthly time coordinate with values at mid-month, expressed in days since the
    /// first of January of `start.year`
    pub fn monthly_time(
        name: &str,
        start: YearMonth,
        count: usize,
        calendar: Calendar,
    ) -> HindexResult<Self> {
        let units = TimeUnits::days_since(CalendarDate::new(start.year, 1, 1));
        let values = (0..count as i32)
            .map(|i| {
                let month = start.offset(i);
                units.encode(CalendarDate::new(month.year, month.month, 15), calendar)
            })
            .collect::<HindexResult<Vec<_>>>()?;

        Ok(Self::new(name, Array1::from(values))
            .with_units(&units.to_string())
            .with_calendar(calendar))
    }

    pub fn with_bounds(mut self, bounds: Array2<f64>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn with_coord_system(mut self, coord_system: CoordSystem) -> Self {
        self.coord_system = Some(coord_system);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Strictly increasing or strictly decreasing
    pub fn is_monotonic(&self) -> bool {
        let v = &self.values;
        if v.len() < 2 {
            return true;
        }
        let increasing = v.iter().zip(v.iter().skip(1)).all(|(a, b)| b > a);
        let decreasing = v.iter().zip(v.iter().skip(1)).all(|(a, b)| b < a);
        increasing || decreasing
    }

    /// Cell bounds, either as stored or guessed by bisecting adjacent points.
    ///
    /// The outer edges extend half a neighbouring spacing past the end points. A single
    /// point has zero-width bounds.
    pub fn bounds_or_guess(&self) -> Array2<f64> {
        if let Some(bounds) = &self.bounds {
            return bounds.clone();
        }
        let v = &self.values;
        let n = v.len();
        let mut bounds = Array2::zeros((n, 2));
        if n == 1 {
            bounds[[0, 0]] = v[0];
            bounds[[0, 1]] = v[0];
            return bounds;
        }
        for i in 0..n {
            let lower = if i == 0 {
                v[0] - (v[1] - v[0]) / 2.0
            } else {
                (v[i - 1] + v[i]) / 2.0
            };
            let upper = if i == n - 1 {
                v[n - 1] + (v[n - 1] - v[n - 2]) / 2.0
            } else {
                (v[i] + v[i + 1]) / 2.0
            };
            bounds[[i, 0]] = lower;
            bounds[[i, 1]] = upper;
        }
        bounds
    }

    /// Subset of this coordinate at the given positions
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            name: self.name.clone(),
            values: self.values.select(Axis(0), indices),
            bounds: self.bounds.as_ref().map(|b| b.select(Axis(0), indices)),
            units: self.units.clone(),
            calendar: self.calendar,
            coord_system: self.coord_system.clone(),
        }
    }

    /// Decode a time coordinate into calendar months
    pub fn year_months(&self) -> HindexResult<Vec<YearMonth>> {
        let units = self.units.as_deref().ok_or_else(|| {
            HindexError::InvalidTimeUnits(format!("coordinate '{}' has no units", self.name))
        })?;
        let units = TimeUnits::parse(units)?;
        let calendar = self.calendar.unwrap_or_default();
        self.values
            .iter()
            .map(|v| units.year_month(*v, calendar))
            .collect()
    }
}

/// A named array of physical values on a grid of named dimensions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GriddedField {
    pub name: String,
    pub units: Option<String>,
    dims: Vec<Coordinate>,
    data: ArrayD<f64>,
}

impl GriddedField {
    /// Create a field, checking that every dimension coordinate matches an array axis
    pub fn new(name: &str, data: ArrayD<f64>, dims: Vec<Coordinate>) -> HindexResult<Self> {
        if dims.len() != data.ndim() {
            return Err(HindexError::ShapeMismatch(format!(
                "{} dimension coordinates for a {}-dimensional array",
                dims.len(),
                data.ndim()
            )));
        }
        for (i, (coord, len)) in dims.iter().zip(data.shape()).enumerate() {
            if coord.len() != *len {
                return Err(HindexError::ShapeMismatch(format!(
                    "coordinate '{}' has {} points but axis {} has length {}",
                    coord.name,
                    coord.len(),
                    i,
                    len
                )));
            }
            if let Some(bounds) = &coord.bounds {
                if bounds.shape() != [coord.len(), 2] {
                    return Err(HindexError::ShapeMismatch(format!(
                        "bounds of '{}' have shape {:?}",
                        coord.name,
                        bounds.shape()
                    )));
                }
            }
            if dims[..i].iter().any(|other| other.name == coord.name) {
                return Err(HindexError::ShapeMismatch(format!(
                    "dimension '{}' appears twice",
                    coord.name
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            units: None,
            dims,
            data,
        })
    }

    /// A zero-dimensional field holding one value
    pub fn scalar(name: &str, value: f64) -> Self {
        Self {
            name: name.to_string(),
            units: None,
            dims: vec![],
            data: ArrayD::from_elem(IxDyn(&[]), value),
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn dims(&self) -> &[Coordinate] {
        &self.dims
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn axis_of(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|c| c.name == name)
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.dims.iter().find(|c| c.name == name)
    }

    pub fn coord_mut(&mut self, name: &str) -> Option<&mut Coordinate> {
        self.dims.iter_mut().find(|c| c.name == name)
    }

    /// Value of a zero-dimensional field
    pub fn as_scalar(&self) -> Option<f64> {
        if self.ndim() == 0 {
            self.data.iter().next().copied()
        } else {
            None
        }
    }

    /// Keep the given positions along a named dimension
    pub fn select(&self, dim: &str, indices: &[usize]) -> HindexResult<Self> {
        let axis = self.require_axis(dim)?;
        let mut dims = self.dims.clone();
        dims[axis] = dims[axis].select(indices);
        Ok(Self {
            name: self.name.clone(),
            units: self.units.clone(),
            dims,
            data: self.data.select(Axis(axis), indices),
        })
    }

    /// Take a single position along a named dimension, dropping that dimension
    pub fn index_dim(&self, dim: &str, index: usize) -> HindexResult<Self> {
        let axis = self.require_axis(dim)?;
        if index >= self.shape()[axis] {
            return Err(HindexError::ShapeMismatch(format!(
                "index {} out of range for dimension '{}'",
                index, dim
            )));
        }
        let mut dims = self.dims.clone();
        dims.remove(axis);
        Ok(Self {
            name: self.name.clone(),
            units: self.units.clone(),
            dims,
            data: self.data.index_axis(Axis(axis), index).to_owned(),
        })
    }

    /// Replace the array and dimensions while keeping name and units
    pub fn with_data(&self, data: ArrayD<f64>, dims: Vec<Coordinate>) -> HindexResult<Self> {
        let mut field = Self::new(&self.name, data, dims)?;
        field.units = self.units.clone();
        Ok(field)
    }

    /// Element-wise combination with a field on the same dimensions
    pub fn zip_with<F>(&self, other: &GriddedField, f: F) -> HindexResult<Self>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.dim_names() != other.dim_names() || self.shape() != other.shape() {
            return Err(HindexError::ShapeMismatch(format!(
                "cannot combine {} {:?}{:?} with {} {:?}{:?}",
                self.name,
                self.dim_names(),
                self.shape(),
                other.name,
                other.dim_names(),
                other.shape()
            )));
        }
        let mut data = self.data.clone();
        data.zip_mut_with(&other.data, |a, b| *a = f(*a, *b));
        Ok(Self {
            name: self.name.clone(),
            units: self.units.clone(),
            dims: self.dims.clone(),
            data,
        })
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut scaled = self.clone();
        scaled.data.mapv_inplace(|v| v * factor);
        scaled
    }

    /// Sum of several fields on identical dimensions
    pub fn sum_of(name: &str, fields: &[GriddedField]) -> HindexResult<Self> {
        let (first, rest) = fields
            .split_first()
            .ok_or_else(|| HindexError::Error("cannot sum an empty list of fields".to_string()))?;
        let mut total = first.clone().renamed(name);
        for field in rest {
            total = total.zip_with(field, |a, b| a + b)?;
        }
        Ok(total)
    }

    pub(crate) fn require_axis(&self, dim: &str) -> HindexResult<usize> {
        self.axis_of(dim).ok_or_else(|| {
            HindexError::ShapeMismatch(format!(
                "field '{}' has no dimension '{}' (dimensions: {:?})",
                self.name,
                dim,
                self.dim_names()
            ))
        })
    }

    /// Array view with `lat` and `lon` moved to the last two axes, flattened to
    /// `(other, lat, lon)`, plus the permutation used
    pub(crate) fn spatial_blocks(
        &self,
        lat_axis: usize,
        lon_axis: usize,
    ) -> HindexResult<(Array3<f64>, Vec<usize>)> {
        let mut order: Vec<usize> = (0..self.ndim())
            .filter(|a| *a != lat_axis && *a != lon_axis)
            .collect();
        order.push(lat_axis);
        order.push(lon_axis);

        let nlat = self.shape()[lat_axis];
        let nlon = self.shape()[lon_axis];
        let other: usize = order[..order.len() - 2]
            .iter()
            .map(|a| self.shape()[*a])
            .product();

        let permuted = self
            .data
            .view()
            .permuted_axes(IxDyn(&order))
            .as_standard_layout()
            .into_owned();
        let blocks = permuted
            .into_shape((other, nlat, nlon))
            .map_err(|e| HindexError::ShapeMismatch(e.to_string()))?;
        Ok((blocks, order))
    }

    /// Inverse of [`spatial_blocks`](Self::spatial_blocks) for blocks whose spatial
    /// extent may have changed
    pub(crate) fn from_spatial_blocks(
        &self,
        blocks: Array3<f64>,
        order: &[usize],
        lat: Coordinate,
        lon: Coordinate,
        lat_axis: usize,
        lon_axis: usize,
    ) -> HindexResult<Self> {
        let (_, nlat, nlon) = blocks.dim();
        let mut permuted_shape: Vec<usize> = order[..order.len() - 2]
            .iter()
            .map(|a| self.shape()[*a])
            .collect();
        permuted_shape.push(nlat);
        permuted_shape.push(nlon);

        let permuted = blocks
            .into_shape(IxDyn(&permuted_shape))
            .map_err(|e| HindexError::ShapeMismatch(e.to_string()))?;

        let mut inverse = vec![0; order.len()];
        for (position, axis) in order.iter().enumerate() {
            inverse[*axis] = position;
        }
        let data = permuted
            .permuted_axes(IxDyn(&inverse))
            .as_standard_layout()
            .into_owned();

        let mut dims = self.dims.clone();
        dims[lat_axis] = lat;
        dims[lon_axis] = lon;
        self.with_data(data, dims)
    }

    /// Drop the last two axes of `(other, lat, lon)` style results back into the
    /// field's non-spatial shape
    pub(crate) fn from_reduced_blocks(
        &self,
        reduced: Array1<f64>,
        lat_axis: usize,
        lon_axis: usize,
    ) -> HindexResult<Self> {
        let dims: Vec<Coordinate> = self
            .dims
            .iter()
            .enumerate()
            .filter(|(a, _)| *a != lat_axis && *a != lon_axis)
            .map(|(_, c)| c.clone())
            .collect();
        let shape: Vec<usize> = dims.iter().map(|c| c.len()).collect();
        let data = reduced
            .into_shape(IxDyn(&shape))
            .map_err(|e| HindexError::ShapeMismatch(e.to_string()))?;
        self.with_data(data, dims)
    }
}
