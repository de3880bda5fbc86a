//! Input helpers.
//!
//! - tab-delimited instrument files: header detection, column mapping and
//!   per-row validation (`ingest`)

pub mod ingest;

pub use ingest::*;
