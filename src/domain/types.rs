//! Shared domain types.
//!
//! Every value here is built once and never mutated: each pipeline stage takes
//! a reference to its input and returns a fresh value. Output-side types derive
//! `Serialize` so they can be emitted as JSON for plotting consumers.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Calibration coefficient of probe 1.
pub const PROBE_1_COEFFICIENT: f64 = 5.4059;
/// Calibration coefficient of probe 2.
pub const PROBE_2_COEFFICIENT: f64 = 5.1669;

/// Window over which the critical-current curve is resampled.
pub const IC_WINDOW: AngleWindow = AngleWindow { lo: -30.0, hi: 30.0 };
/// Window over which the double-Lorentzian model is fitted.
pub const FIT_WINDOW: AngleWindow = AngleWindow { lo: -20.0, hi: 20.0 };

/// One recorded angular sweep, in instrument time order.
///
/// Angle rises monotonically up to a single reversal point and falls afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// Degrees.
    pub angle: Vec<f64>,
    /// Load-cell voltage (V).
    pub load: Vec<f64>,
    /// Magnetic field (T).
    pub field: Vec<f64>,
    /// Seconds. Carried along but not used by the reduction.
    pub time: Vec<f64>,
}

impl Sweep {
    pub fn len(&self) -> usize {
        self.angle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angle.is_empty()
    }
}

/// A sweep plus the auxiliary instrument channels.
#[derive(Debug, Clone)]
pub struct Recording {
    pub sweep: Sweep,
    pub temperature: Vec<f64>,
    /// Pickup-coil angle (deg).
    pub pickup_coil: Vec<f64>,
    /// Not every file layout records heater power.
    pub heater_power: Option<Vec<f64>>,
}

/// Measurement probe. Each probe has a fixed calibration coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Probe {
    One,
    Two,
}

impl Probe {
    pub fn from_id(id: u8) -> Result<Self, AnalysisError> {
        match id {
            1 => Ok(Probe::One),
            2 => Ok(Probe::Two),
            other => Err(AnalysisError::InvalidGeometry(format!(
                "unknown probe id {other} (expected 1 or 2)"
            ))),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Probe::One => 1,
            Probe::Two => 2,
        }
    }

    pub fn coefficient(self) -> f64 {
        match self {
            Probe::One => PROBE_1_COEFFICIENT,
            Probe::Two => PROBE_2_COEFFICIENT,
        }
    }
}

/// Sample dimensions (m) and the probe used to measure it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleGeometry {
    width: f64,
    length: f64,
    probe: Probe,
}

impl SampleGeometry {
    /// Validate and build a geometry.
    ///
    /// Besides positive dimensions, the demagnetization term
    /// `1 - width/(3*length)` must stay positive or the current scale blows up.
    pub fn new(width: f64, length: f64, probe: Probe) -> Result<Self, AnalysisError> {
        if !(width.is_finite() && width > 0.0) {
            return Err(AnalysisError::InvalidGeometry(format!(
                "width must be finite and > 0 (got {width})"
            )));
        }
        if !(length.is_finite() && length > 0.0) {
            return Err(AnalysisError::InvalidGeometry(format!(
                "length must be finite and > 0 (got {length})"
            )));
        }
        if 1.0 - width / (3.0 * length) <= 0.0 {
            return Err(AnalysisError::InvalidGeometry(format!(
                "width {width} is at least three times length {length}; demagnetization factor is not positive"
            )));
        }
        Ok(Self {
            width,
            length,
            probe,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn probe(&self) -> Probe {
        self.probe
    }

    pub fn probe_coefficient(&self) -> f64 {
        self.probe.coefficient()
    }
}

/// Zero-based `[left, right)` slice of the raw sweep used for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CutoffRange {
    pub left: usize,
    pub right: usize,
}

impl CutoffRange {
    pub fn new(left: usize, right: usize) -> Self {
        Self { left, right }
    }

    /// Build a range from two picked indices in whatever order they arrived.
    pub fn from_clicks(first: usize, second: usize) -> Self {
        Self {
            left: first.min(second),
            right: first.max(second),
        }
    }

    pub fn span(&self) -> usize {
        self.right.saturating_sub(self.left)
    }
}

/// A sub-sweep with repeated-angle samples removed.
///
/// Consecutive angle differences are all nonzero.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSweep {
    pub angle: Vec<f64>,
    pub load: Vec<f64>,
    pub field: Vec<f64>,
}

impl CleanedSweep {
    pub fn len(&self) -> usize {
        self.angle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angle.is_empty()
    }
}

/// Baseline-corrected sweep: load peak at 0°, minimum load at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedSweep {
    pub angle: Vec<f64>,
    pub load: Vec<f64>,
    pub field: Vec<f64>,
    /// Raw angle that was shifted to 0°.
    pub peak_angle: f64,
    /// Line subtracted from the load: `load -= slope * angle + intercept`.
    pub baseline_slope: f64,
    pub baseline_intercept: f64,
}

/// Critical current (mA) on a uniform, ascending angle grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcCurve {
    pub angle: Vec<f64>,
    pub ic: Vec<f64>,
}

impl IcCurve {
    pub fn len(&self) -> usize {
        self.angle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angle.is_empty()
    }
}

/// Double-Lorentzian parameters, in output order `(i01, gamma1, i02, gamma2)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorentzParams {
    pub i01: f64,
    pub gamma1: f64,
    pub i02: f64,
    pub gamma2: f64,
}

impl LorentzParams {
    pub fn to_array(self) -> [f64; 4] {
        [self.i01, self.gamma1, self.i02, self.gamma2]
    }

    pub fn from_array(p: [f64; 4]) -> Self {
        Self {
            i01: p[0],
            gamma1: p[1],
            i02: p[2],
            gamma2: p[3],
        }
    }

    /// Evaluate the model at an angle in degrees.
    pub fn evaluate(&self, angle_deg: f64) -> f64 {
        crate::models::predict(angle_deg, &self.to_array())
    }
}

/// Fitted parameters plus solver diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LorentzFit {
    pub params: LorentzParams,
    /// Samples inside the fit window.
    pub n_points: usize,
    pub rmse: f64,
    /// Residual evaluations used by the solver.
    pub evaluations: usize,
}

/// Open angular interval `(lo, hi)` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleWindow {
    pub lo: f64,
    pub hi: f64,
}

impl AngleWindow {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, angle: f64) -> bool {
        self.lo < angle && angle < self.hi
    }
}

/// Which header convention a data file was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeaderLayout {
    Standard,
    SemiStandard,
    Explicit,
}

impl HeaderLayout {
    pub fn display_name(self) -> &'static str {
        match self {
            HeaderLayout::Standard => "standard",
            HeaderLayout::SemiStandard => "semi-standard",
            HeaderLayout::Explicit => "explicit",
        }
    }
}

/// Zero-based column indices for each instrument channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub layout: HeaderLayout,
    pub angle: usize,
    pub field: usize,
    pub temperature: usize,
    pub heater_power: Option<usize>,
    pub pickup_coil: usize,
    pub load_cell: usize,
    pub time: usize,
}

impl ColumnMapping {
    /// Largest column index the mapping reads from.
    pub fn max_column(&self) -> usize {
        [
            self.angle,
            self.field,
            self.temperature,
            self.heater_power.unwrap_or(0),
            self.pickup_coil,
            self.load_cell,
            self.time,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// How the analysis obtains its cutoff range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CutoffMode {
    /// Use `--left`/`--right`, defaulting to index 1 and the reversal point.
    Fixed,
    /// Ask for two indices on stdin.
    Prompt,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub data_path: PathBuf,
    pub geometry: SampleGeometry,
    /// Explicit 1-based column indices, overriding header detection.
    pub columns: Option<Vec<usize>>,
    pub cutoff_mode: CutoffMode,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub ic_window: AngleWindow,
    pub fit_window: AngleWindow,
    pub json: bool,
}
