//! Piecewise-linear interpolation and uniform grids.
//!
//! The interpolant extrapolates linearly past either end using the outermost
//! segment, so callers can sample slightly outside the observed range without
//! special-casing the edges.

use std::cmp::Ordering;

/// Piecewise-linear interpolant over `(x, y)` knots.
#[derive(Debug, Clone)]
pub struct LinearInterpolant {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolant {
    /// Build from parallel slices. Knots are sorted by `x` (stable, so equal
    /// abscissae keep their input order).
    ///
    /// Returns `None` for fewer than two knots or mismatched lengths.
    pub fn new(x: &[f64], y: &[f64]) -> Option<Self> {
        if x.len() != y.len() || x.len() < 2 {
            return None;
        }
        let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let (xs, ys) = pairs.into_iter().unzip();
        Some(Self { xs, ys })
    }

    pub fn x_min(&self) -> f64 {
        self.xs[0]
    }

    pub fn x_max(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }

    /// Evaluate at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        // Index of the segment [k-1, k] that brackets x, clamped to the end
        // segments for extrapolation.
        let k = self.xs.partition_point(|&v| v < x).clamp(1, n - 1);
        let (x0, x1) = (self.xs[k - 1], self.xs[k]);
        let (y0, y1) = (self.ys[k - 1], self.ys[k]);
        if x1 == x0 {
            return y1;
        }
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// `count` evenly spaced points from `start` to `end` inclusive.
///
/// A single point collapses to `start`.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count as f64 - 1.0);
            let mut out: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            // Pin the last point so the grid spans exactly [start, end].
            out[count - 1] = end;
            out
        }
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
