//! Reporting: text summary and machine-readable output.
//!
//! The JSON form is what a plotting front-end consumes: the resampled curve
//! (scatter), the fitted parameters (annotation) and the model evaluated on
//! the same grid (overlay).

use serde::Serialize;

use crate::app::pipeline::AnalysisRun;
use crate::domain::{AngleWindow, CutoffRange, HeaderLayout, IcCurve, LorentzFit, SampleGeometry};
use crate::error::AppError;

pub mod format;

pub use format::*;

/// Serializable view of one run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport<'a> {
    pub tool: &'static str,
    pub source: &'a str,
    pub layout: Option<HeaderLayout>,
    pub cutoff: CutoffRange,
    pub geometry: SampleGeometry,
    pub ic_scale: f64,
    pub mean_field: f64,
    pub peak_angle: f64,
    pub ic_window: AngleWindow,
    pub fit_window: AngleWindow,
    pub curve: &'a IcCurve,
    pub fit: &'a LorentzFit,
    /// Fitted model evaluated on `curve.angle`.
    pub model: Vec<f64>,
}

impl<'a> AnalysisReport<'a> {
    pub fn from_run(run: &'a AnalysisRun) -> Self {
        let out = &run.output;
        let params = out.fit.params;
        Self {
            tool: "torque",
            source: &run.source.label,
            layout: run.source.layout,
            cutoff: out.cutoff,
            geometry: run.options.geometry,
            ic_scale: out.ic_scale,
            mean_field: out.mean_field,
            peak_angle: out.corrected.peak_angle,
            ic_window: run.options.ic_window,
            fit_window: run.options.fit_window,
            curve: &out.curve,
            fit: &out.fit,
            model: out.curve.angle.iter().map(|&a| params.evaluate(a)).collect(),
        }
    }
}

/// Render a run as pretty JSON.
pub fn format_json(run: &AnalysisRun) -> Result<String, AppError> {
    serde_json::to_string_pretty(&AnalysisReport::from_run(run))
        .map_err(|e| AppError::new(2, format!("Failed to serialize report: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::{PipelineOptions, run_recording};
    use crate::data::{SyntheticOptions, synthetic_recording};
    use crate::domain::{LorentzParams, Probe};

    fn demo_run() -> AnalysisRun {
        let geometry = SampleGeometry::new(4e-3, 13e-3, Probe::Two).unwrap();
        let params = LorentzParams::from_array([1.0, 2.5, 0.8, 10.0]);
        let recording = synthetic_recording(&params, &SyntheticOptions::new(geometry)).unwrap();
        run_recording("synthetic".to_string(), &recording, &PipelineOptions::new(geometry)).unwrap()
    }

    #[test]
    fn summary_lists_parameters_in_output_order() {
        let text = format_run_summary(&demo_run());
        let i01 = text.find("i01").unwrap();
        let g1 = text.find("gamma1").unwrap();
        let i02 = text.find("i02").unwrap();
        let g2 = text.find("gamma2").unwrap();
        assert!(i01 < g1 && g1 < i02 && i02 < g2);
        assert!(text.contains("probe 2 (coeff 5.1669)"));
        assert!(text.contains("mean temperature: 77.00 K"));
    }

    #[test]
    fn json_carries_curve_and_overlay() {
        let run = demo_run();
        let json = format_json(&run).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let n = run.output.curve.len();
        assert_eq!(value["curve"]["angle"].as_array().unwrap().len(), n);
        assert_eq!(value["model"].as_array().unwrap().len(), n);
        assert_eq!(value["geometry"]["probe"], "Two");
        assert!(value["fit"]["params"]["gamma2"].as_f64().unwrap() <= 15.0);
        assert!(value["layout"].is_null());
    }
}
