//! Linear background subtraction and peak alignment.
//!
//! The background is the straight line through the sweep's first and last
//! `(angle, load)` samples, not a regression over all points. It models slow
//! load-cell drift between the start and end of the sweep.

use log::debug;

use crate::domain::{CleanedSweep, CorrectedSweep};
use crate::error::AnalysisError;

/// Detrend the load and recentre both axes.
///
/// - angle: shifted so the sample with maximum detrended load sits at 0°
/// - load: shifted so its minimum is exactly 0
/// - field: passed through unchanged
pub fn correct(sweep: &CleanedSweep) -> Result<CorrectedSweep, AnalysisError> {
    let n = sweep.angle.len().min(sweep.load.len());
    if n == 0 {
        // The extractor never hands out fewer than two samples; treat an empty
        // sweep as having no usable endpoints.
        return Err(AnalysisError::DegenerateSweep { angle: f64::NAN });
    }

    let (a0, a1) = (sweep.angle[0], sweep.angle[n - 1]);
    let (l0, l1) = (sweep.load[0], sweep.load[n - 1]);
    if a1 == a0 {
        return Err(AnalysisError::DegenerateSweep { angle: a0 });
    }

    let slope = (l1 - l0) / (a1 - a0);
    let intercept = l0 - slope * a0;

    let detrended: Vec<f64> = sweep.angle[..n]
        .iter()
        .zip(&sweep.load[..n])
        .map(|(&a, &l)| l - (slope * a + intercept))
        .collect();

    // First occurrence wins on ties.
    let mut peak_idx = 0;
    let mut load_min = detrended[0];
    for (i, &v) in detrended.iter().enumerate() {
        if v > detrended[peak_idx] {
            peak_idx = i;
        }
        if v < load_min {
            load_min = v;
        }
    }
    let peak_angle = sweep.angle[peak_idx];

    debug!(
        "baseline: slope={slope:.6e} V/deg, peak at {peak_angle:.3}°, min load {load_min:.6e} V"
    );

    Ok(CorrectedSweep {
        angle: sweep.angle[..n].iter().map(|&a| a - peak_angle).collect(),
        load: detrended.iter().map(|&v| v - load_min).collect(),
        field: sweep.field.clone(),
        peak_angle,
        baseline_slope: slope,
        baseline_intercept: intercept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaned(angle: Vec<f64>, load: Vec<f64>) -> CleanedSweep {
        let field = vec![1.0; angle.len()];
        CleanedSweep { angle, load, field }
    }

    #[test]
    fn removes_endpoint_drift_and_centres_peak() {
        // Triangle peaked at 40° on top of a drift of 0.01 V/deg.
        let angle: Vec<f64> = (0..=16).map(|i| 10.0 + i as f64 * 5.0).collect();
        let load: Vec<f64> = angle
            .iter()
            .map(|&a| (20.0 - (a - 40.0).abs()).max(0.0) * 0.1 + 0.01 * a + 3.0)
            .collect();
        let out = correct(&cleaned(angle, load)).unwrap();

        assert!((out.baseline_slope - 0.01).abs() < 1e-12);
        assert_eq!(out.peak_angle, 40.0);
        let peak = out
            .load
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > out.load[best] { i } else { best });
        assert_eq!(out.angle[peak], 0.0);

        let min = out.load.iter().copied().fold(f64::INFINITY, f64::min);
        assert!(min.abs() < 1e-12);
        assert!((out.load[peak] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn minimum_is_zero_even_below_the_endpoint_line() {
        let out = correct(&cleaned(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![1.0, 0.2, 3.0, 0.5, 1.0],
        ))
        .unwrap();
        let min = out.load.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.0);
        assert_eq!(out.angle[2], 0.0);
        assert_eq!(out.angle, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn field_passes_through() {
        let mut input = cleaned(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 0.0]);
        input.field = vec![0.9, 1.0, 1.1];
        let out = correct(&input).unwrap();
        assert_eq!(out.field, vec![0.9, 1.0, 1.1]);
    }

    #[test]
    fn equal_endpoint_angles_are_degenerate() {
        let err = correct(&cleaned(vec![5.0, 6.0, 5.0], vec![0.0, 1.0, 0.0])).unwrap_err();
        assert_eq!(err, AnalysisError::DegenerateSweep { angle: 5.0 });
    }
}
