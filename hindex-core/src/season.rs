//! Seasonal aggregation of monthly fields
//!
//! A season is a contiguous run of calendar months that may wrap the year end, such as
//! September to March. Each instance of a season is labelled by the year of its final
//! month, so the September 1960 to March 1961 winter is season 1961.
//!
//! [`aggregate`] groups a monthly field into season instances, keeps only complete ones
//! and averages each into a single value per season year.
//!
//! ```rust
//! use hindex_core::calendar::YearMonth;
//! use hindex_core::season::SeasonDefinition;
//!
//! let winter = SeasonDefinition::parse("sondjfm").unwrap();
//! assert_eq!(winter.len(), 7);
//! assert_eq!(winter.label_year(YearMonth::new(1960, 11)), Some(1961));
//! assert_eq!(winter.label_year(YearMonth::new(1961, 3)), Some(1961));
//! assert_eq!(winter.label_year(YearMonth::new(1961, 6)), None);
//! ```

use crate::calendar::YearMonth;
use crate::coords::resolve_time;
use crate::errors::{HindexError, HindexResult};
use crate::field::{Coordinate, GriddedField};
use crate::lead_time::{LeadTimeSeries, SEASON_YEAR};
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

const MONTH_INITIALS: &str = "jfmamjjasond";

/// A named contiguous run of calendar months
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeasonDefinition {
    name: String,
    months: Vec<u32>,
}

impl SeasonDefinition {
    /// Build a season from month numbers (1 = January) in chronological order
    pub fn from_months(months: &[u32]) -> HindexResult<Self> {
        let describe = || format!("{:?}", months);
        if months.is_empty() || months.len() > 12 {
            return Err(HindexError::InvalidSeason(describe()));
        }
        if months.iter().any(|m| !(1..=12).contains(m)) {
            return Err(HindexError::InvalidSeason(describe()));
        }
        if months.windows(2).any(|w| w[1] != w[0] % 12 + 1) {
            return Err(HindexError::InvalidSeason(describe()));
        }
        let initials: Vec<char> = MONTH_INITIALS.chars().collect();
        let name = months
            .iter()
            .map(|m| initials[(*m - 1) as usize])
            .collect();
        Ok(Self {
            name,
            months: months.to_vec(),
        })
    }

    /// Build a season from month initials such as `"djfm"` or `"sondjfm"`.
    ///
    /// The string is matched cyclically against `jfmamjjasond`; the earliest starting
    /// month wins when several match.
    pub fn parse(season: &str) -> HindexResult<Self> {
        let lower = season.trim().to_lowercase();
        let len = lower.chars().count();
        if len == 0 || len > 12 {
            return Err(HindexError::InvalidSeason(season.to_string()));
        }
        let cycle = MONTH_INITIALS.repeat(2);
        let start = (0..12)
            .find(|s| cycle[*s..*s + len] == lower)
            .ok_or_else(|| HindexError::InvalidSeason(season.to_string()))?;
        let months: Vec<u32> = (0..len).map(|i| ((start + i) % 12 + 1) as u32).collect();
        Self::from_months(&months)
    }

    /// September to March
    pub fn extended_winter() -> Self {
        Self {
            name: "sondjfm".to_string(),
            months: vec![9, 10, 11, 12, 1, 2, 3],
        }
    }

    /// December to March
    pub fn djfm() -> Self {
        Self {
            name: "djfm".to_string(),
            months: vec![12, 1, 2, 3],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn months(&self) -> &[u32] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn contains(&self, month: u32) -> bool {
        self.months.contains(&month)
    }

    /// Whether `months` holds every month of the season exactly once
    pub fn is_complete(&self, months: impl IntoIterator<Item = u32>) -> bool {
        let mut seen = vec![false; self.months.len()];
        for month in months {
            match self.months.iter().position(|m| *m == month) {
                Some(i) if !seen[i] => seen[i] = true,
                _ => return false,
            }
        }
        seen.iter().all(|s| *s)
    }

    /// Label year of the season instance containing `month`, if it is in season
    pub fn label_year(&self, month: YearMonth) -> Option<i32> {
        let position = self.months.iter().position(|m| *m == month.month)?;
        let to_end = (self.months.len() - 1 - position) as i32;
        Some(month.offset(to_end).year)
    }
}

impl Default for SeasonDefinition {
    fn default() -> Self {
        Self::extended_winter()
    }
}

impl fmt::Display for SeasonDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl TryFrom<String> for SeasonDefinition {
    type Error = HindexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SeasonDefinition> for String {
    fn from(value: SeasonDefinition) -> Self {
        value.name
    }
}

/// Average a monthly field into one value per complete season.
///
/// The time axis is replaced by a [`SEASON_YEAR`] axis at the same position. A season
/// instance is complete when every one of its months is present exactly once, so a
/// repeated month never stands in for a missing one; partial
/// seasons at either end of the record are dropped. The mean divides by the season
/// length. A field with no complete season produces an empty series.
pub fn aggregate(
    field: &GriddedField,
    season: &SeasonDefinition,
    init_year: i32,
) -> HindexResult<LeadTimeSeries> {
    let time_dim = resolve_time(field)?;
    let axis = field.require_axis(&time_dim)?;
    let time = &field.dims()[axis];
    let months = time.year_months()?;

    let mut groups: BTreeMap<i32, Vec<(usize, u32)>> = BTreeMap::new();
    for (i, month) in months.iter().enumerate() {
        if let Some(year) = season.label_year(*month) {
            groups.entry(year).or_default().push((i, month.month));
        }
    }

    let divisor = season.len() as f64;
    let mut years = Vec::new();
    let mut means: Vec<ArrayD<f64>> = Vec::new();
    for (year, members) in groups {
        if !season.is_complete(members.iter().map(|(_, month)| *month)) {
            log::debug!(
                "Dropping incomplete {} season {} of {} ({} steps for {} months)",
                season,
                year,
                field.name,
                members.len(),
                season.len()
            );
            continue;
        }
        let indices: Vec<usize> = members.iter().map(|(i, _)| *i).collect();
        let sum = field.data().select(Axis(axis), &indices).sum_axis(Axis(axis));
        means.push(sum / divisor);
        years.push(year);
    }

    let data = if means.is_empty() {
        let mut shape = field.shape().to_vec();
        shape[axis] = 0;
        ArrayD::zeros(IxDyn(&shape))
    } else {
        let views: Vec<_> = means.iter().map(|m| m.view()).collect();
        ndarray::stack(Axis(axis), &views)
            .map_err(|e| HindexError::ShapeMismatch(e.to_string()))?
    };

    log::debug!(
        "Aggregated {} into {} {} seasons ({:?})",
        field.name,
        years.len(),
        season,
        years
    );

    let mut dims = field.dims().to_vec();
    dims[axis] = Coordinate::new(
        SEASON_YEAR,
        Array1::from_iter(years.iter().map(|y| *y as f64)),
    );
    LeadTimeSeries::new(field.with_data(data, dims)?, init_year)
}
