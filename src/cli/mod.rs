//! Command-line parsing for the torque-magnetometer Ic reduction.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the reduction/fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::CutoffMode;

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "torque",
    version,
    about = "Critical current vs angle from torque-magnetometer sweeps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reduce a recorded sweep file and fit the double-Lorentzian model.
    Analyze(AnalyzeArgs),
    /// Run the pipeline on a synthetic sweep generated from known parameters.
    Demo(DemoArgs),
}

/// Sample geometry and probe selection.
///
/// Defaults can be supplied through the environment (or a `.env` file).
#[derive(Debug, Args, Clone)]
pub struct GeometryArgs {
    /// Sample width (m).
    #[arg(long, env = "TORQUE_WIDTH", default_value_t = 4e-3)]
    pub width: f64,

    /// Sample length (m).
    #[arg(long, env = "TORQUE_LENGTH", default_value_t = 13e-3)]
    pub length: f64,

    /// Probe used for the measurement (1 or 2).
    #[arg(long, env = "TORQUE_PROBE", default_value_t = 1)]
    pub probe: u8,
}

/// Output options shared by all commands.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Print the curve and fit as JSON instead of the text summary.
    #[arg(long)]
    pub json: bool,

    /// Lower/upper bound (deg) of the Ic resampling window.
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], default_values_t = [-30.0, 30.0], allow_negative_numbers = true)]
    pub ic_window: Vec<f64>,

    /// Lower/upper bound (deg) of the fit window.
    #[arg(long, num_args = 2, value_names = ["LO", "HI"], default_values_t = [-20.0, 20.0], allow_negative_numbers = true)]
    pub fit_window: Vec<f64>,
}

/// Options for reducing a recorded file.
#[derive(Debug, Args, Clone)]
pub struct AnalyzeArgs {
    /// Tab-delimited data file. If omitted, pick one interactively.
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Explicit 1-based columns: angle,field,temperature,heater,pickup,load,time.
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<usize>>,

    /// How the cutoff range is chosen.
    #[arg(long, value_enum, default_value_t = CutoffMode::Fixed)]
    pub cutoff: CutoffMode,

    /// Left cutoff index (0-based, inclusive). Defaults to 1.
    #[arg(long)]
    pub left: Option<usize>,

    /// Right cutoff index (0-based, exclusive). Defaults to the sweep reversal.
    #[arg(long)]
    pub right: Option<usize>,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Options for the synthetic demo.
#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Model parameters used to generate the sweep: i01,gamma1,i02,gamma2.
    #[arg(long, value_delimiter = ',', default_values_t = [1.2, 3.5, 0.9, 11.0])]
    pub params: Vec<f64>,

    /// Applied field (T).
    #[arg(long, default_value_t = 1.0)]
    pub field: f64,

    /// Linear load drift (V per degree).
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub drift: f64,

    /// Gaussian load noise (V).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}
