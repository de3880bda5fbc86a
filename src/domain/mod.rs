//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw and derived sweeps (`Sweep`, `CleanedSweep`, `CorrectedSweep`)
//! - sample configuration (`SampleGeometry`, `Probe`, `CutoffRange`)
//! - outputs (`IcCurve`, `LorentzParams`, `LorentzFit`)

pub mod types;

pub use types::*;
