//! Error types.
//!
//! - `AnalysisError`: failures raised by the reduction pipeline itself
//!   (cutoffs, baseline, windows, geometry, fit).
//! - `AppError`: what the binary reports, carrying a process exit code.
//!
//! Exit codes: 2 = input/configuration, 3 = data cannot be reduced, 4 = fit failed.

use thiserror::Error;

/// Failures of the core reduction pipeline.
///
/// None of these are retried: each one points at a data or configuration
/// problem that reprocessing the same input would hit again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid cutoff [{left}, {right}) for a sweep of {len} samples: {reason}")]
    InvalidCutoff {
        left: usize,
        right: usize,
        len: usize,
        reason: String,
    },

    #[error("degenerate sweep: first and last angle are both {angle}°, baseline slope is undefined")]
    DegenerateSweep { angle: f64 },

    #[error("{stage}: no samples inside the ({lo}°, {hi}°) window")]
    EmptyWindow {
        stage: &'static str,
        lo: f64,
        hi: f64,
    },

    #[error("{stage}: {available} sample(s) in the fit window, need at least {required}")]
    InsufficientData {
        stage: &'static str,
        available: usize,
        required: usize,
    },

    #[error("invalid sample geometry: {0}")]
    InvalidGeometry(String),

    #[error("Lorentz fit did not converge after {evaluations} evaluations: {reason}")]
    FitDidNotConverge { evaluations: usize, reason: String },
}

impl AnalysisError {
    /// Process exit code used when this error reaches `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            AnalysisError::InvalidCutoff { .. } | AnalysisError::InvalidGeometry(_) => 2,
            AnalysisError::DegenerateSweep { .. }
            | AnalysisError::EmptyWindow { .. }
            | AnalysisError::InsufficientData { .. } => 3,
            AnalysisError::FitDidNotConverge { .. } => 4,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_errors_map_to_exit_codes() {
        let cutoff = AnalysisError::InvalidCutoff {
            left: 3,
            right: 3,
            len: 10,
            reason: "right must be greater than left".to_string(),
        };
        let app: AppError = cutoff.into();
        assert_eq!(app.exit_code(), 2);
        assert!(app.to_string().contains("[3, 3)"));

        let fit: AppError = AnalysisError::FitDidNotConverge {
            evaluations: 1000,
            reason: "budget exhausted".to_string(),
        }
        .into();
        assert_eq!(fit.exit_code(), 4);

        let window: AppError = AnalysisError::EmptyWindow {
            stage: "physical conversion",
            lo: -30.0,
            hi: 30.0,
        }
        .into();
        assert_eq!(window.exit_code(), 3);
    }
}
