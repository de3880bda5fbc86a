//! Curve fitting.
//!
//! Responsibilities:
//!
//! - restrict the Ic curve to the fit window
//! - solve the bounded double-Lorentzian least-squares problem

pub mod fitter;

pub use fitter::*;
