//! Python bindings exposed as `hindex._lib`
//!
//! Fields cross the boundary as numpy arrays plus named 1-D coordinates. Configuration
//! and simulation identities cross as plain dicts via `pythonize`.

use hindex_core::calendar::Calendar;
use hindex_core::config::DiagnosticConfig;
use hindex_core::errors::HindexError;
use hindex_core::field::{Coordinate, GriddedField};
use hindex_core::longitude::normalize;
use hindex_core::regrid::regrid as regrid_field;
use hindex_core::simulation::parse_filename as parse_cmip_filename;
use hindex_core::spatial::{spatial_mean, BoundingBox};
use hindex_indices::catalog::IndexCatalog;
use hindex_indices::diagnostic::IndexDiagnostic;
use numpy::{PyArray1, PyArrayDyn, PyReadonlyArray1, PyReadonlyArrayDyn, ToPyArray};
use pyo3::exceptions::{PyIOError, PyKeyError, PyValueError};
use pyo3::prelude::*;
use pythonize::{depythonize_bound, pythonize};
use std::path::PathBuf;

/// Map a library error onto the closest Python exception
pub fn to_py_err(error: HindexError) -> PyErr {
    match error {
        HindexError::UnknownIndex(_) => PyKeyError::new_err(error.to_string()),
        HindexError::Io(_) => PyIOError::new_err(error.to_string()),
        _ => PyValueError::new_err(error.to_string()),
    }
}

/// Python wrapper for GriddedField
///
/// Example:
///     field = GriddedField(
///         "psl",
///         data,
///         [("time", times), ("lat", lats), ("lon", lons)],
///         units="Pa",
///     )
///     field.set_time_units("time", "days since 1960-01-01", "360_day")
#[pyclass]
#[pyo3(name = "GriddedField")]
#[derive(Debug, Clone)]
pub struct PyGriddedField(pub GriddedField);

#[pymethods]
impl PyGriddedField {
    #[new]
    #[pyo3(signature = (name, data, dims, units=None))]
    fn new(
        name: &str,
        data: PyReadonlyArrayDyn<'_, f64>,
        dims: Vec<(String, PyReadonlyArray1<'_, f64>)>,
        units: Option<&str>,
    ) -> PyResult<Self> {
        let coords = dims
            .iter()
            .map(|(dim, values)| Coordinate::new(dim, values.as_array().to_owned()))
            .collect();
        let field =
            GriddedField::new(name, data.as_array().to_owned(), coords).map_err(to_py_err)?;
        Ok(Self(match units {
            Some(units) => field.with_units(units),
            None => field,
        }))
    }

    /// Attach CF time units and a calendar to a dimension
    #[pyo3(signature = (dim, units, calendar="standard"))]
    fn set_time_units(&mut self, dim: &str, units: &str, calendar: &str) -> PyResult<()> {
        let calendar: Calendar = calendar.parse().map_err(to_py_err)?;
        let coord = self
            .0
            .coord_mut(dim)
            .ok_or_else(|| PyKeyError::new_err(format!("no dimension '{}'", dim)))?;
        coord.units = Some(units.to_string());
        coord.calendar = Some(calendar);
        Ok(())
    }

    #[getter]
    fn name(&self) -> String {
        self.0.name.clone()
    }

    #[getter]
    fn units(&self) -> Option<String> {
        self.0.units.clone()
    }

    #[getter]
    fn dims(&self) -> Vec<String> {
        self.0.dim_names().iter().map(|d| d.to_string()).collect()
    }

    #[getter]
    fn data<'py>(&self, py: Python<'py>) -> Bound<'py, PyArrayDyn<f64>> {
        self.0.data().to_pyarray_bound(py)
    }

    /// Values of a dimension coordinate
    fn coord<'py>(&self, py: Python<'py>, dim: &str) -> PyResult<Bound<'py, PyArray1<f64>>> {
        self.0
            .coord(dim)
            .map(|c| c.values.to_pyarray_bound(py))
            .ok_or_else(|| PyKeyError::new_err(format!("no dimension '{}'", dim)))
    }

    fn __repr__(&self) -> String {
        format!(
            "<GriddedField name={} dims={:?} shape={:?}>",
            self.0.name,
            self.0.dim_names(),
            self.0.shape()
        )
    }
}

/// Identifiers of the built-in indices
#[pyfunction]
fn list_indices() -> Vec<String> {
    IndexCatalog::standard()
        .identifiers()
        .into_iter()
        .map(String::from)
        .collect()
}

#[pyfunction]
fn normalize_longitude(lon_min: f64, lon_max: f64, grid_uses_positive_lon: bool) -> (f64, f64) {
    normalize(lon_min, lon_max, grid_uses_positive_lon)
}

/// Simulation identity of a CMIP file as a dict
#[pyfunction]
fn parse_filename(py: Python<'_>, path: &str) -> PyResult<PyObject> {
    let run = parse_cmip_filename(path).map_err(to_py_err)?;
    Ok(pythonize(py, &run)?)
}

#[pyfunction]
fn regrid(
    source: PyRef<'_, PyGriddedField>,
    target: PyRef<'_, PyGriddedField>,
) -> PyResult<PyGriddedField> {
    regrid_field(&source.0, &target.0)
        .map(PyGriddedField)
        .map_err(to_py_err)
}

#[pyfunction]
fn box_mean(
    field: PyRef<'_, PyGriddedField>,
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
) -> PyResult<PyGriddedField> {
    spatial_mean(&field.0, &BoundingBox::new(lon_min, lon_max, lat_min, lat_max))
        .map(PyGriddedField)
        .map_err(to_py_err)
}

/// Apply one index recipe without seasonal or lead-time reduction
#[pyfunction]
fn extract_index(field: PyRef<'_, PyGriddedField>, index: &str) -> PyResult<PyGriddedField> {
    IndexCatalog::standard()
        .get(index)
        .and_then(|definition| definition.extract(&field.0))
        .map(PyGriddedField)
        .map_err(to_py_err)
}

/// Run the full diagnostic on a field read from `filename`.
///
/// Returns the reduced field, the contributing season years and the provenance record.
#[pyfunction]
#[pyo3(signature = (field, filename, config=None))]
fn compute_index(
    py: Python<'_>,
    field: PyRef<'_, PyGriddedField>,
    filename: &str,
    config: Option<Bound<'_, PyAny>>,
) -> PyResult<(PyGriddedField, Vec<i32>, PyObject)> {
    let config: DiagnosticConfig = match config {
        Some(config) => depythonize_bound(config)?,
        None => DiagnosticConfig::default(),
    };
    let diagnostic = IndexDiagnostic::new(config).map_err(to_py_err)?;
    let run = parse_cmip_filename(filename).map_err(to_py_err)?;
    log::debug!("Computing {} for {} from Python", diagnostic.definition().name, run);

    let derived = diagnostic
        .compute(&field.0, &run, vec![PathBuf::from(filename)])
        .map_err(to_py_err)?;
    let provenance = pythonize(py, &derived.provenance)?;
    Ok((PyGriddedField(derived.field), derived.season_years, provenance))
}

#[pymodule]
#[pyo3(name = "_lib")]
pub fn hindex(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_class::<PyGriddedField>()?;
    m.add_function(wrap_pyfunction!(list_indices, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_longitude, m)?)?;
    m.add_function(wrap_pyfunction!(parse_filename, m)?)?;
    m.add_function(wrap_pyfunction!(regrid, m)?)?;
    m.add_function(wrap_pyfunction!(box_mean, m)?)?;
    m.add_function(wrap_pyfunction!(extract_index, m)?)?;
    m.add_function(wrap_pyfunction!(compute_index, m)?)?;
    Ok(())
}
