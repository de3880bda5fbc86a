//! `torque-ic` library crate.
//!
//! The binary (`torque`) is a thin wrapper around this library so that:
//!
//! - the reduction stages are testable without spawning processes
//! - the pipeline can be driven from other front-ends (plotting, batch runs)

pub mod app;
pub mod cli;
pub mod convert;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod sweep;
