//! Forecast lead-time series and window selection
//!
//! A decadal hindcast initialised in year `y0` produces one seasonal value per season
//! year `y`; its lead time is `y - y0`. Skill is assessed over a window of lead times,
//! by default years 2 to 9, and [`select`] averages the seasons inside that window.

use crate::errors::{HindexError, HindexResult};
use crate::field::{Coordinate, GriddedField};
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Name of the dimension holding season label years
pub const SEASON_YEAR: &str = "season_year";

/// A field whose time axis has been aggregated into season years
#[derive(Clone, Debug, PartialEq)]
pub struct LeadTimeSeries {
    field: GriddedField,
    init_year: i32,
}

impl LeadTimeSeries {
    /// Wrap a field that has a [`SEASON_YEAR`] dimension
    pub fn new(field: GriddedField, init_year: i32) -> HindexResult<Self> {
        field.require_axis(SEASON_YEAR)?;
        Ok(Self { field, init_year })
    }

    /// One scalar per season year
    pub fn from_scalars(
        name: &str,
        season_years: &[i32],
        values: &[f64],
        init_year: i32,
    ) -> HindexResult<Self> {
        let years = Coordinate::new(
            SEASON_YEAR,
            Array1::from_iter(season_years.iter().map(|y| *y as f64)),
        );
        let data = ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.to_vec())
            .map_err(|e| HindexError::ShapeMismatch(e.to_string()))?;
        Self::new(GriddedField::new(name, data, vec![years])?, init_year)
    }

    pub fn field(&self) -> &GriddedField {
        &self.field
    }

    pub fn init_year(&self) -> i32 {
        self.init_year
    }

    pub fn season_years(&self) -> Vec<i32> {
        self.field
            .coord(SEASON_YEAR)
            .map(|c| c.values.iter().map(|v| v.round() as i32).collect())
            .unwrap_or_default()
    }

    pub fn lead_times(&self) -> Vec<i32> {
        self.season_years()
            .into_iter()
            .map(|y| y - self.init_year)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.season_years().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inclusive range of lead times averaged into the final index
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadTimeWindow {
    pub start: i32,
    pub end: i32,
}

impl Default for LeadTimeWindow {
    fn default() -> Self {
        Self { start: 2, end: 9 }
    }
}

impl LeadTimeWindow {
    pub fn new(start: i32, end: i32) -> HindexResult<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> HindexResult<()> {
        if self.start > self.end {
            return Err(HindexError::InvalidConfig(format!(
                "lead time window starts at {} after it ends at {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn contains(&self, lead_time: i32) -> bool {
        lead_time >= self.start && lead_time <= self.end
    }
}

/// Result of reducing a series over a lead-time window
#[derive(Clone, Debug, PartialEq)]
pub struct WindowMean {
    /// Mean over the retained season years, without the season-year dimension
    pub field: GriddedField,
    /// Season years that contributed to the mean
    pub season_years: Vec<i32>,
}

/// Average the seasons whose lead time lies inside the window.
///
/// Every axis other than the season year is preserved, so a series of scalars
/// yields a zero-dimensional field and a series of maps yields a map.
pub fn select(series: &LeadTimeSeries, window: &LeadTimeWindow) -> HindexResult<WindowMean> {
    window.validate()?;
    let lead_times = series.lead_times();
    let keep: Vec<usize> = lead_times
        .iter()
        .enumerate()
        .filter(|(_, lead)| window.contains(**lead))
        .map(|(i, _)| i)
        .collect();
    if keep.is_empty() {
        return Err(HindexError::InsufficientLeadYears {
            start: window.start,
            end: window.end,
            available: lead_times,
        });
    }

    let all_years = series.season_years();
    let season_years: Vec<i32> = keep.iter().map(|i| all_years[*i]).collect();
    log::debug!(
        "Averaging {} over season years {:?}",
        series.field().name,
        season_years
    );

    let retained = series.field().select(SEASON_YEAR, &keep)?;
    let axis = retained.require_axis(SEASON_YEAR)?;
    let data = retained
        .data()
        .mean_axis(Axis(axis))
        .ok_or_else(|| HindexError::ShapeMismatch(format!("'{}' is empty", SEASON_YEAR)))?;
    let mut dims = retained.dims().to_vec();
    dims.remove(axis);

    Ok(WindowMean {
        field: retained.with_data(data, dims)?,
        season_years,
    })
}
