//! Angular critical-current model.
//!
//! Implemented as small, pure functions so the fitter and the report can share
//! them without carrying any state.

pub mod model;

pub use model::*;
