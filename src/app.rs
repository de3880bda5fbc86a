//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads a recorded sweep (or generates a synthetic one)
//! - resolves the cutoff range
//! - runs extraction, baseline correction, conversion and the Lorentz fit
//! - prints the text summary or JSON

use clap::Parser;
use log::info;

use crate::app::pipeline::{AnalysisRun, PipelineOptions};
use crate::cli::picker::{CutoffSource, FixedCutoff, PromptCutoff};
use crate::cli::{AnalyzeArgs, Command, DemoArgs, GeometryArgs, OutputArgs};
use crate::data::{SyntheticOptions, synthetic_recording};
use crate::domain::{AnalysisConfig, AngleWindow, CutoffMode, LorentzParams, Probe, SampleGeometry};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `torque` binary.
pub fn run() -> Result<(), AppError> {
    // A `.env` next to the data can pin sample geometry; a missing file is fine.
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    // Validate flags before possibly prompting for a file.
    let geometry = geometry_from_args(&args.geometry)?;
    let data_path = match &args.file {
        Some(path) => crate::cli::picker::validate_data_path(path)?,
        None => crate::cli::picker::prompt_for_data_path()?,
    };
    let config = analysis_config_from_args(&args, geometry, data_path)?;

    let ingest = crate::io::load_recording(&config.data_path, config.columns.as_deref())?;
    info!(
        "loaded {} rows from {} ({})",
        ingest.rows_used,
        config.data_path.display(),
        ingest.mapping.layout.display_name()
    );

    let opts = PipelineOptions {
        geometry: config.geometry,
        ic_window: config.ic_window,
        fit_window: config.fit_window,
    };
    let mut source: Box<dyn CutoffSource> = match config.cutoff_mode {
        CutoffMode::Fixed => Box::new(FixedCutoff {
            left: config.left,
            right: config.right,
        }),
        CutoffMode::Prompt => Box::new(PromptCutoff::stdio()),
    };

    let label = config.data_path.display().to_string();
    let run = pipeline::run_ingested(label, &ingest, &opts, source.as_mut())?;
    print_run(&run, config.json)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let geometry = geometry_from_args(&args.geometry)?;
    let (ic_window, fit_window) = windows_from_args(&args.output)?;

    let params: [f64; 4] = args.params.as_slice().try_into().map_err(|_| {
        AppError::new(
            2,
            format!(
                "--params expects 4 values (i01,gamma1,i02,gamma2), got {}",
                args.params.len()
            ),
        )
    })?;
    let truth = LorentzParams::from_array(params);

    let mut synth = SyntheticOptions::new(geometry);
    synth.field = args.field;
    synth.drift = args.drift;
    synth.noise = args.noise;
    synth.seed = args.seed;
    let recording = synthetic_recording(&truth, &synth)?;

    let opts = PipelineOptions {
        geometry,
        ic_window,
        fit_window,
    };
    let label = format!(
        "synthetic (i01={}, gamma1={}, i02={}, gamma2={}, seed={})",
        truth.i01, truth.gamma1, truth.i02, truth.gamma2, args.seed
    );
    let run = pipeline::run_recording(label, &recording, &opts)?;
    print_run(&run, args.output.json)
}

fn print_run(run: &AnalysisRun, json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", crate::report::format_json(run)?);
    } else {
        println!("{}", crate::report::format_run_summary(run));
    }
    Ok(())
}

/// Build the run configuration from parsed flags and an already validated geometry.
pub fn analysis_config_from_args(
    args: &AnalyzeArgs,
    geometry: SampleGeometry,
    data_path: std::path::PathBuf,
) -> Result<AnalysisConfig, AppError> {
    let (ic_window, fit_window) = windows_from_args(&args.output)?;

    match &args.columns {
        Some(cols) if cols.len() != crate::io::EXPLICIT_COLUMN_COUNT => {
            return Err(AppError::new(
                2,
                format!(
                    "--columns expects {} indices (angle,field,temperature,heater,pickup,load,time), got {}",
                    crate::io::EXPLICIT_COLUMN_COUNT,
                    cols.len()
                ),
            ));
        }
        _ => {}
    }

    Ok(AnalysisConfig {
        data_path,
        geometry,
        columns: args.columns.clone(),
        cutoff_mode: args.cutoff,
        left: args.left,
        right: args.right,
        ic_window,
        fit_window,
        json: args.output.json,
    })
}

pub fn geometry_from_args(args: &GeometryArgs) -> Result<SampleGeometry, AppError> {
    let probe = Probe::from_id(args.probe)?;
    Ok(SampleGeometry::new(args.width, args.length, probe)?)
}

fn windows_from_args(args: &OutputArgs) -> Result<(AngleWindow, AngleWindow), AppError> {
    Ok((
        window_from(&args.ic_window, "--ic-window")?,
        window_from(&args.fit_window, "--fit-window")?,
    ))
}

fn window_from(bounds: &[f64], flag: &str) -> Result<AngleWindow, AppError> {
    match bounds {
        [lo, hi] if lo.is_finite() && hi.is_finite() && lo < hi => Ok(AngleWindow::new(*lo, *hi)),
        _ => Err(AppError::new(
            2,
            format!("{flag} expects two finite bounds with LO < HI, got {bounds:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn analyze_args(argv: &[&str]) -> AnalyzeArgs {
        let mut full = vec!["torque", "analyze"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Analyze(args) => args,
            Command::Demo(_) => panic!("expected analyze"),
        }
    }

    fn config_for(args: &AnalyzeArgs) -> Result<AnalysisConfig, AppError> {
        let geometry = geometry_from_args(&args.geometry)?;
        analysis_config_from_args(args, geometry, "run.dat".into())
    }

    #[test]
    fn config_carries_flags() {
        let args = analyze_args(&["--left", "4", "--probe", "2", "--ic-window", "-25", "25"]);
        let cfg = config_for(&args).unwrap();
        assert_eq!(cfg.left, Some(4));
        assert_eq!(cfg.geometry.probe(), Probe::Two);
        assert_eq!(cfg.ic_window, AngleWindow::new(-25.0, 25.0));
        assert_eq!(cfg.fit_window, AngleWindow::new(-20.0, 20.0));
    }

    #[test]
    fn invalid_flags_map_to_config_exit_code() {
        let args = analyze_args(&["--probe", "3"]);
        assert_eq!(geometry_from_args(&args.geometry).unwrap_err().exit_code(), 2);

        let args = analyze_args(&["--width", "0"]);
        assert_eq!(config_for(&args).unwrap_err().exit_code(), 2);

        let args = analyze_args(&["--columns", "1,2,3"]);
        assert!(config_for(&args).is_err());

        let args = analyze_args(&["--fit-window", "20", "-20"]);
        assert!(config_for(&args).is_err());
    }

    #[test]
    fn config_uses_the_validated_geometry() {
        let args = analyze_args(&["--probe", "1", "--width", "4e-3"]);
        let geometry = SampleGeometry::new(2e-3, 10e-3, Probe::Two).unwrap();
        let cfg = analysis_config_from_args(&args, geometry, "run.dat".into()).unwrap();
        assert_eq!(cfg.geometry, geometry);
    }
}
