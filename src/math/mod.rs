//! Mathematical utilities: interpolation and summary statistics.

pub mod interp;

pub use interp::*;
