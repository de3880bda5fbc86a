//! Load-cell signal → critical current.
//!
//! The torque measured by the load cell scales with `Ic · B · cos θ`. Dividing
//! by the mean field and `cos θ`, and multiplying by a geometric scale, gives
//! the critical current. The result is then resampled onto a uniform angle
//! grid covering the ±30° window around the load peak.
//!
//! Two interpolants are involved:
//! - `g`: corrected angle → load, evaluated back at the sample angles
//! - `h`: corrected angle → ic (mA), built over the **full** sweep and
//!   evaluated on the windowed output grid
//!
//! `h` deliberately spans the full sweep while the grid only spans the window,
//! so grid edges interpolate between real samples instead of extrapolating.

use log::debug;

use crate::domain::{AngleWindow, CorrectedSweep, IC_WINDOW, IcCurve, SampleGeometry};
use crate::error::AnalysisError;
use crate::math::{LinearInterpolant, linspace, mean};

const STAGE: &str = "physical conversion";

/// Load-cell lever-arm factor.
const LEVER_FACTOR: f64 = 4.0;
/// Load-cell force calibration factor.
const FORCE_FACTOR: f64 = 1.3;
/// Unit conversion of the geometric denominator.
const UNIT_FACTOR: f64 = 100.0;
/// A → mA.
const MILLIAMPS_PER_AMP: f64 = 1000.0;

/// Geometric scale converting field-normalized load into critical current.
///
/// `(coeff · 4 · 1.3) / (100 · w · l · (1 - w / 3l))`
pub fn ic_scale(geometry: &SampleGeometry) -> f64 {
    let w = geometry.width();
    let l = geometry.length();
    (geometry.probe_coefficient() * LEVER_FACTOR * FORCE_FACTOR)
        / (UNIT_FACTOR * w * l * (1.0 - w / (3.0 * l)))
}

/// Convert a corrected sweep into an `IcCurve` over the default ±30° window.
pub fn to_ic_curve(
    sweep: &CorrectedSweep,
    geometry: &SampleGeometry,
) -> Result<IcCurve, AnalysisError> {
    to_ic_curve_in(sweep, geometry, IC_WINDOW)
}

/// Convert a corrected sweep into an `IcCurve` over `window`.
pub fn to_ic_curve_in(
    sweep: &CorrectedSweep,
    geometry: &SampleGeometry,
    window: AngleWindow,
) -> Result<IcCurve, AnalysisError> {
    let empty = AnalysisError::EmptyWindow {
        stage: STAGE,
        lo: window.lo,
        hi: window.hi,
    };

    let g = LinearInterpolant::new(&sweep.angle, &sweep.load).ok_or_else(|| empty.clone())?;
    let field_mean = mean(&sweep.field).ok_or_else(|| empty.clone())?;
    let scale = ic_scale(geometry);

    // Current in amps at every corrected sample angle.
    let ic: Vec<f64> = sweep
        .angle
        .iter()
        .map(|&a| g.eval(a) * scale / (field_mean * a.to_radians().cos()))
        .collect();

    let restricted: Vec<f64> = sweep
        .angle
        .iter()
        .copied()
        .filter(|&a| window.contains(a))
        .collect();
    if restricted.is_empty() {
        return Err(empty);
    }

    let lo = restricted.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = restricted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let grid = linspace(lo, hi, restricted.len());

    let ic_ma: Vec<f64> = ic.iter().map(|&v| v * MILLIAMPS_PER_AMP).collect();
    let h = LinearInterpolant::new(&sweep.angle, &ic_ma).ok_or(empty)?;
    let ic_grid = h.eval_many(&grid);

    debug!(
        "{STAGE}: icScale={scale:.6e}, mean field {field_mean:.4} T, {} grid points over [{lo:.3}, {hi:.3}]° (knots span [{:.3}, {:.3}]°)",
        grid.len(),
        h.x_min(),
        h.x_max()
    );

    Ok(IcCurve {
        angle: grid,
        ic: ic_grid,
    })
}
