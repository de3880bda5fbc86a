//! Synthetic input data for demos and round-trip checks.

pub mod synthetic;

pub use synthetic::*;
