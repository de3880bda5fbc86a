//! Sweep cleanup: locating, slicing and detrending the usable angular sweep.
//!
//! - `reversal`: find where the angle trace turns around
//! - `extract`: slice to a cutoff range and drop repeated angles
//! - `baseline`: subtract the endpoint line and recentre angle/load

pub mod baseline;
pub mod extract;
pub mod reversal;

pub use baseline::correct;
pub use extract::extract;
pub use reversal::find_reversal;
