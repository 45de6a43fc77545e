//! Linear interpolation kernels used by the regridder

use num::Float;

/// Linear interpolation between two values.
///
/// An end point with zero weight does not contribute, so a NaN there is ignored.
pub fn lin_interp<T: Float>(v0: T, v1: T, fac: T) -> T {
    if fac == T::zero() {
        v0
    } else if fac == T::one() {
        v1
    } else {
        v0 + (v1 - v0) * fac
    }
}

/// Bilinear interpolation between four corner values.
///
/// `f00` is at `(y0, x0)`, `f01` at `(y0, x1)`, `f10` at `(y1, x0)` and `f11` at `(y1, x1)`.
pub fn bilin_interp<T: Float>(f00: T, f01: T, f10: T, f11: T, fac_y: T, fac_x: T) -> T {
    let lower = lin_interp(f00, f01, fac_x);
    let upper = lin_interp(f10, f11, fac_x);
    lin_interp(lower, upper, fac_y)
}

/// Pair of source positions and the fractional distance between them
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stencil {
    pub lo: usize,
    pub hi: usize,
    pub fac: f64,
}

/// Stencil for `x` on a monotonic axis with at least two points.
///
/// Outside the axis range the end pair is used, which extrapolates linearly.
pub fn linear_stencil(axis: &[f64], x: f64) -> Stencil {
    let n = axis.len();
    debug_assert!(n >= 2);
    let ascending = axis[n - 1] > axis[0];
    let past = axis
        .iter()
        .position(|v| if ascending { *v > x } else { *v < x })
        .unwrap_or(n);
    let lo = past.saturating_sub(1).min(n - 2);
    let hi = lo + 1;
    Stencil {
        lo,
        hi,
        fac: (x - axis[lo]) / (axis[hi] - axis[lo]),
    }
}

/// Stencil for `x` on an ascending axis that repeats every `period`.
///
/// The last point is joined to the first one period later.
pub fn periodic_stencil(axis: &[f64], x: f64, period: f64) -> Stencil {
    let n = axis.len();
    debug_assert!(n >= 2);
    let start = axis[0];
    let x = start + (x - start).rem_euclid(period);
    let past = axis.iter().position(|v| *v > x).unwrap_or(n);
    if past == n {
        let lo = n - 1;
        return Stencil {
            lo,
            hi: 0,
            fac: (x - axis[lo]) / (start + period - axis[lo]),
        };
    }
    let lo = past.saturating_sub(1);
    Stencil {
        lo,
        hi: past,
        fac: (x - axis[lo]) / (axis[past] - axis[lo]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn bilinear_centre_is_mean_of_corners() {
        assert_abs_diff_eq!(bilin_interp(0.0, 1.0, 2.0, 3.0, 0.5, 0.5), 1.5);
        assert_abs_diff_eq!(bilin_interp(0.0, 1.0, 2.0, 3.0, 0.0, 1.0), 1.0);
        assert_abs_diff_eq!(bilin_interp(0.0, 1.0, 2.0, 3.0, 1.0, 0.0), 2.0);
    }

    #[test]
    fn linear_stencil_interpolates_and_extrapolates() {
        let axis = [0.0, 10.0, 20.0];
        assert_eq!(linear_stencil(&axis, 15.0), Stencil { lo: 1, hi: 2, fac: 0.5 });
        assert_eq!(linear_stencil(&axis, 20.0), Stencil { lo: 1, hi: 2, fac: 1.0 });
        assert_eq!(linear_stencil(&axis, -5.0), Stencil { lo: 0, hi: 1, fac: -0.5 });
        assert_eq!(linear_stencil(&axis, 30.0), Stencil { lo: 1, hi: 2, fac: 2.0 });

        let values = [1.0, 2.0, 3.0];
        let s = linear_stencil(&axis, 30.0);
        assert_abs_diff_eq!(lin_interp(values[s.lo], values[s.hi], s.fac), 4.0);
    }

    #[test]
    fn linear_stencil_on_descending_axis() {
        let axis = [90.0, 85.0, 80.0];
        let stencil = linear_stencil(&axis, 82.5);
        assert_eq!((stencil.lo, stencil.hi), (1, 2));
        assert_abs_diff_eq!(stencil.fac, 0.5);
        let s = linear_stencil(&axis, 92.5);
        let values = [1.0, 0.0, -1.0];
        assert_abs_diff_eq!(lin_interp(values[s.lo], values[s.hi], s.fac), 1.5);
    }

    #[test]
    fn periodic_stencil_wraps_past_last_point() {
        let axis = [0.0, 90.0, 180.0, 270.0];
        assert_eq!(periodic_stencil(&axis, 315.0, 360.0), Stencil { lo: 3, hi: 0, fac: 0.5 });
        assert_eq!(periodic_stencil(&axis, -45.0, 360.0), Stencil { lo: 3, hi: 0, fac: 0.5 });
        assert_eq!(periodic_stencil(&axis, 45.0, 360.0), Stencil { lo: 0, hi: 1, fac: 0.5 });
        assert_eq!(periodic_stencil(&axis, 90.0, 360.0), Stencil { lo: 1, hi: 2, fac: 0.0 });
    }

    #[test]
    fn nan_propagates_only_with_weight() {
        assert!(lin_interp(f64::NAN, 1.0, 0.25).is_nan());
        assert_abs_diff_eq!(lin_interp(f64::NAN, 1.0, 1.0), 1.0);
        assert_abs_diff_eq!(lin_interp(2.0, f64::NAN, 0.0), 2.0);
        assert_abs_diff_eq!(bilin_interp(1.0, f64::NAN, f64::NAN, f64::NAN, 0.0, 0.0), 1.0);
        assert!(bilin_interp(1.0, 1.0, f64::NAN, 1.0, 0.5, 0.0).is_nan());
    }
}
