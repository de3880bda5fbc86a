//! Shared reduction pipeline used by both the `analyze` and `demo` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! sweep -> extract -> baseline -> physical conversion -> Lorentz fit
//!
//! The commands can then focus on where the sweep and cutoffs come from and on
//! presentation (text vs JSON).

use log::info;

use crate::cli::picker::CutoffSource;
use crate::convert::{ic_scale, to_ic_curve_in};
use crate::domain::{
    AngleWindow, CleanedSweep, CorrectedSweep, CutoffRange, FIT_WINDOW, HeaderLayout, IC_WINDOW,
    IcCurve, LorentzFit, Recording, SampleGeometry, Sweep,
};
use crate::error::{AnalysisError, AppError};
use crate::io::ingest::IngestedData;
use crate::math::mean;
use crate::sweep::{correct, extract, find_reversal};

/// Options that shape a single reduction.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub geometry: SampleGeometry,
    pub ic_window: AngleWindow,
    pub fit_window: AngleWindow,
}

impl PipelineOptions {
    pub fn new(geometry: SampleGeometry) -> Self {
        Self {
            geometry,
            ic_window: IC_WINDOW,
            fit_window: FIT_WINDOW,
        }
    }
}

/// Every intermediate value of one reduction.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub cutoff: CutoffRange,
    pub cleaned: CleanedSweep,
    pub corrected: CorrectedSweep,
    pub curve: IcCurve,
    pub fit: LorentzFit,
    pub ic_scale: f64,
    pub mean_field: f64,
}

/// Where the sweep came from, for reporting.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub label: String,
    pub layout: Option<HeaderLayout>,
    pub rows_read: usize,
    pub rows_used: usize,
    pub row_errors: usize,
    pub reversal: Option<usize>,
    pub mean_temperature: Option<f64>,
}

/// A complete run: source description, configuration and outputs.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub source: SourceInfo,
    pub options: PipelineOptions,
    pub output: RunOutput,
}

/// Run the four reduction stages on an already-loaded sweep.
pub fn run_analysis(
    sweep: &Sweep,
    cutoff: CutoffRange,
    opts: &PipelineOptions,
) -> Result<RunOutput, AnalysisError> {
    let cleaned = extract(sweep, cutoff)?;
    let corrected = correct(&cleaned)?;
    let curve = to_ic_curve_in(&corrected, &opts.geometry, opts.ic_window)?;
    let fit = crate::fit::fit(&curve, opts.fit_window)?;

    Ok(RunOutput {
        cutoff,
        ic_scale: ic_scale(&opts.geometry),
        mean_field: mean(&cleaned.field).unwrap_or(f64::NAN),
        cleaned,
        corrected,
        curve,
        fit,
    })
}

/// Resolve the cutoff through `source` and reduce an ingested file.
pub fn run_ingested(
    label: String,
    ingest: &IngestedData,
    opts: &PipelineOptions,
    source: &mut dyn CutoffSource,
) -> Result<AnalysisRun, AppError> {
    let recording = &ingest.recording;
    let reversal = find_reversal(&recording.sweep.angle);
    let cutoff = source.select(&recording.sweep.load, reversal.unwrap_or(recording.sweep.len()))?;
    info!("cutoff [{}, {}) (reversal at {reversal:?})", cutoff.left, cutoff.right);

    let output = run_analysis(&recording.sweep, cutoff, opts)?;

    Ok(AnalysisRun {
        source: SourceInfo {
            label,
            layout: Some(ingest.mapping.layout),
            rows_read: ingest.rows_read,
            rows_used: ingest.rows_used,
            row_errors: ingest.row_errors.len(),
            reversal,
            mean_temperature: mean(&recording.temperature),
        },
        options: opts.clone(),
        output,
    })
}

/// Reduce a generated recording over its whole rising ramp.
pub fn run_recording(
    label: String,
    recording: &Recording,
    opts: &PipelineOptions,
) -> Result<AnalysisRun, AppError> {
    let n = recording.sweep.len();
    let reversal = find_reversal(&recording.sweep.angle);
    // Include the turning sample itself so the sweep ends on its last ramp point.
    let right = reversal.map_or(n, |r| r + 1);
    let output = run_analysis(&recording.sweep, CutoffRange::new(0, right), opts)?;

    Ok(AnalysisRun {
        source: SourceInfo {
            label,
            layout: None,
            rows_read: n,
            rows_used: n,
            row_errors: 0,
            reversal,
            mean_temperature: mean(&recording.temperature),
        },
        options: opts.clone(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticOptions, synthetic_sweep};
    use crate::domain::{LorentzParams, Probe};

    fn geometry() -> SampleGeometry {
        SampleGeometry::new(4e-3, 13e-3, Probe::One).unwrap()
    }

    #[test]
    fn extract_and_correct_are_deterministic() {
        let mut opts = SyntheticOptions::new(geometry());
        opts.noise = 1e-9;
        opts.drift = 2e-6;
        opts.duplicate_every = 7;
        let sweep = synthetic_sweep(&LorentzParams::from_array([1.0, 3.0, 1.0, 12.0]), &opts).unwrap();
        let cutoff = CutoffRange::new(3, 150);

        let a = correct(&extract(&sweep, cutoff).unwrap()).unwrap();
        let b = correct(&extract(&sweep, cutoff).unwrap()).unwrap();
        assert_eq!(a, b);
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a.angle), bits(&b.angle));
        assert_eq!(bits(&a.load), bits(&b.load));
    }

    #[test]
    fn pipeline_surfaces_stage_errors() {
        let sweep = Sweep {
            angle: vec![0.0, 1.0, 2.0, 3.0],
            load: vec![0.0; 4],
            field: vec![1.0; 4],
            time: vec![0.0; 4],
        };
        let opts = PipelineOptions::new(geometry());
        assert!(matches!(
            run_analysis(&sweep, CutoffRange::new(2, 2), &opts),
            Err(AnalysisError::InvalidCutoff { .. })
        ));
    }

    #[test]
    fn model_sweep_round_trips_through_the_pipeline() {
        let truth = LorentzParams::from_array([1.2, 3.5, 0.9, 11.0]);
        let mut synth = SyntheticOptions::new(geometry());
        synth.drift = 1e-6;
        synth.offset = 0.3;
        let sweep = synthetic_sweep(&truth, &synth).unwrap();
        let reversal = find_reversal(&sweep.angle).unwrap();

        let out = run_analysis(
            &sweep,
            CutoffRange::new(0, reversal + 1),
            &PipelineOptions::new(geometry()),
        )
        .unwrap();

        assert_eq!(out.corrected.peak_angle, synth.peak_offset);
        for (got, want) in out.fit.params.to_array().iter().zip(truth.to_array()) {
            assert!((got - want).abs() <= 0.01 * want, "{got} vs {want}");
        }
    }
}
