//! Conversion from corrected load-cell signal to physical units.

pub mod physical;

pub use physical::*;
