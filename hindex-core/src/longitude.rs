//! Longitude conventions and antimeridian-safe box selection
//!
//! Index boxes are written in signed degrees (−180..180) while most CMIP grids store
//! longitude in 0..360. [`normalize`] folds a box into the grid's convention and
//! [`LongitudeSpan`] decides which grid longitudes fall inside it, walking eastward from
//! the western edge so boxes that cross the antimeridian or the Greenwich meridian
//! select the intended cells.
//!
//! ```rust
//! use hindex_core::longitude::{normalize, LongitudeSpan};
//!
//! assert_eq!(normalize(-10.0, 10.0, true), (-10.0, 10.0));
//! assert_eq!(normalize(350.0, 10.0, false), (-10.0, 10.0));
//!
//! let span = LongitudeSpan::new(-10.0, 10.0, true);
//! assert!(span.contains(355.0));
//! assert!(span.contains(5.0));
//! assert!(!span.contains(180.0));
//! ```

/// Floored modulo: the result takes the sign of `b`, so `floor_mod(-10.0, 360.0) == 350.0`
pub fn floor_mod(a: f64, b: f64) -> f64 {
    a - b * (a / b).floor()
}

/// True when every longitude of the grid is non-negative (0..360 convention)
pub fn has_positive_longitude(longitudes: &[f64]) -> bool {
    longitudes.iter().all(|lon| *lon >= 0.0)
}

/// Express a box's longitude extent in the grid's convention.
///
/// On a positive grid both edges are folded into [0, 360). If the western edge then
/// lies east of the eastern edge the box wraps, and the western edge is moved down by
/// 360° so the pair describes a contiguous eastward interval. A box spanning 360° or
/// more stays a full circle.
pub fn normalize(lon_min: f64, lon_max: f64, grid_uses_positive_lon: bool) -> (f64, f64) {
    let full_circle = lon_max - lon_min >= 360.0;
    let (mut lon_min, mut lon_max) = if grid_uses_positive_lon {
        (floor_mod(lon_min, 360.0), floor_mod(lon_max, 360.0))
    } else {
        (lon_min, lon_max)
    };
    if full_circle {
        lon_max = lon_min + 360.0;
    } else if lon_min > lon_max {
        lon_min -= 360.0;
    }
    (lon_min, lon_max)
}

/// Eastward longitude interval used to select grid cells
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LongitudeSpan {
    west: f64,
    width: f64,
}

impl LongitudeSpan {
    /// Build the span for a box on a grid with the given convention
    pub fn new(lon_min: f64, lon_max: f64, grid_uses_positive_lon: bool) -> Self {
        let (west, east) = normalize(lon_min, lon_max, grid_uses_positive_lon);
        Self {
            west,
            width: east - west,
        }
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn east(&self) -> f64 {
        self.west + self.width
    }

    pub fn is_full_circle(&self) -> bool {
        self.width >= 360.0
    }

    /// Whether `lon` lies on the eastward arc from the western to the eastern edge
    pub fn contains(&self, lon: f64) -> bool {
        if self.is_full_circle() {
            return true;
        }
        floor_mod(lon - self.west, 360.0) <= self.width
    }

    /// Whether a cell with edges `a` and `b` shares any longitude with the span,
    /// touching edges included
    pub fn overlaps(&self, a: f64, b: f64) -> bool {
        if self.is_full_circle() {
            return true;
        }
        let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
        self.contains(lower) || floor_mod(self.west - lower, 360.0) <= upper - lower
    }

    /// Positions of the cells, given as `(lower, upper)` edges, that overlap the span
    pub fn select_cells(&self, cells: &[(f64, f64)]) -> Vec<usize> {
        cells
            .iter()
            .enumerate()
            .filter(|(_, (a, b))| self.overlaps(*a, *b))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Shortest angular distance between two longitudes, in degrees
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = floor_mod(a - b, 360.0);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive_grid() -> Vec<f64> {
        (0..72).map(|i| i as f64 * 5.0).collect()
    }

    fn signed_grid() -> Vec<f64> {
        (0..72).map(|i| -180.0 + i as f64 * 5.0).collect()
    }

    /// 5 degree cells centred on `centres`
    fn cells(centres: &[f64]) -> Vec<(f64, f64)> {
        centres.iter().map(|c| (c - 2.5, c + 2.5)).collect()
    }

    #[test]
    fn floor_mod_matches_matlab_mod() {
        assert_eq!(floor_mod(-27.5, 360.0), 332.5);
        assert_eq!(floor_mod(-10.0, 360.0), 350.0);
        assert_eq!(floor_mod(370.0, 360.0), 10.0);
        assert_eq!(floor_mod(0.0, 360.0), 0.0);
    }

    #[test]
    fn normalize_is_idempotent() {
        let boxes = [
            (-28.0, -20.0),
            (-25.0, -16.0),
            (-80.0, 0.0),
            (-180.0, 180.0),
            (160.0, -150.0),
            (350.0, 10.0),
            (50.0, 70.0),
        ];
        for positive in [true, false] {
            for (lo, hi) in boxes {
                let once = normalize(lo, hi, positive);
                let twice = normalize(once.0, once.1, positive);
                assert_eq!(once, twice, "box ({}, {}) positive={}", lo, hi, positive);
            }
        }
    }

    #[test]
    fn normalize_is_identity_for_boxes_inside_0_360() {
        for (lo, hi) in [(10.0, 50.0), (0.0, 359.0), (90.0, 110.0)] {
            assert_eq!(normalize(lo, hi, true), (lo, hi));
        }
        // Wrapping boxes come back as the same edges modulo 360
        let (lo, hi) = normalize(350.0, 10.0, true);
        assert_eq!(floor_mod(lo, 360.0), 350.0);
        assert_eq!(hi, 10.0);
    }

    #[test]
    fn wraparound_selects_same_cells_in_both_conventions() {
        let positive = positive_grid();
        let signed = signed_grid();

        let from_positive: Vec<f64> = LongitudeSpan::new(350.0, 10.0, true)
            .select_cells(&cells(&positive))
            .into_iter()
            .map(|i| floor_mod(positive[i], 360.0))
            .collect();
        let mut from_signed: Vec<f64> = LongitudeSpan::new(-10.0, 10.0, false)
            .select_cells(&cells(&signed))
            .into_iter()
            .map(|i| floor_mod(signed[i], 360.0))
            .collect();

        let mut sorted_positive = from_positive.clone();
        sorted_positive.sort_by(|a, b| a.partial_cmp(b).unwrap());
        from_signed.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted_positive, from_signed);
        assert_eq!(sorted_positive, vec![0.0, 5.0, 10.0, 350.0, 355.0]);
    }

    #[test]
    fn wrapped_box_is_not_empty() {
        let span = LongitudeSpan::new(-10.0, 10.0, true);
        assert_eq!(span.select_cells(&cells(&positive_grid())).len(), 5);
    }

    #[test]
    fn full_circle_selects_everything() {
        let span = LongitudeSpan::new(-180.0, 180.0, true);
        assert_eq!(span.select_cells(&cells(&positive_grid())).len(), 72);
        let span = LongitudeSpan::new(-180.0, 180.0, false);
        assert_eq!(span.select_cells(&cells(&signed_grid())).len(), 72);
    }

    #[test]
    fn antimeridian_box_walks_eastward() {
        // 160E to 150W crosses the dateline
        let span = LongitudeSpan::new(160.0, -150.0, false);
        let selected: Vec<f64> = span
            .select_cells(&cells(&signed_grid()))
            .into_iter()
            .map(|i| signed_grid()[i])
            .collect();
        assert!(selected.contains(&160.0));
        assert!(selected.contains(&-180.0));
        assert!(selected.contains(&-150.0));
        assert!(!selected.contains(&0.0));
        assert_eq!(selected.len(), 11);

        let positive = LongitudeSpan::new(160.0, -150.0, true);
        assert_eq!(positive.select_cells(&cells(&positive_grid())).len(), 11);
    }

    #[test]
    fn cells_overlapping_an_edge_are_kept() {
        // -28..-20 on a positive grid is 332..340
        let span = LongitudeSpan::new(-28.0, -20.0, true);
        assert!(span.overlaps(327.5, 332.5));
        assert!(span.overlaps(337.5, 342.5));
        assert!(!span.overlaps(342.5, 347.5));
        // A span narrower than one cell still selects the cell around it
        let narrow = LongitudeSpan::new(331.0, 332.0, true);
        assert_eq!(narrow.select_cells(&cells(&positive_grid())), vec![66]);
        // Touching edges count as overlap
        assert!(LongitudeSpan::new(-10.0, 10.0, true).overlaps(10.0, 15.0));
        assert!(LongitudeSpan::new(-10.0, 10.0, true).overlaps(345.0, 350.0));
    }

    #[test]
    fn cell_overlap_works_across_the_antimeridian() {
        let span = LongitudeSpan::new(160.0, -150.0, false);
        assert!(span.overlaps(-182.5, -177.5));
        assert!(span.overlaps(207.5, 212.5));
        assert!(!span.overlaps(0.0, 5.0));
    }

    #[test]
    fn angular_distance_wraps() {
        assert_eq!(angular_distance(355.0, 5.0), 10.0);
        assert_eq!(angular_distance(-27.5, 332.5), 0.0);
        assert_eq!(angular_distance(0.0, 180.0), 180.0);
    }
}
