//! Double-Lorentzian angular model of the critical current.
//!
//! With θ in radians and parameters `p = [i01, γ1, i02, γ2]`:
//!
//! ```text
//! f(θ) = Σ_k (i0k γk / π) / (cos²θ + γk² sin²θ)
//! ```
//!
//! The fitter relies on two primitive operations:
//! - predict `f` for a given angle (for residuals and overlay curves)
//! - fill the Jacobian row `∂f/∂p` (for the bound-aware convergence test)

use std::f64::consts::PI;

/// Number of free parameters.
pub const PARAM_COUNT: usize = 4;

/// Single Lorentzian term.
fn term(intensity: f64, gamma: f64, cos2: f64, sin2: f64) -> f64 {
    (intensity * gamma / PI) / (cos2 + gamma * gamma * sin2)
}

/// `(cos²θ, sin²θ)` for an angle in degrees.
pub fn angle_terms(angle_deg: f64) -> (f64, f64) {
    let (s, c) = angle_deg.to_radians().sin_cos();
    (c * c, s * s)
}

/// Predict the critical current at `angle_deg` (degrees).
pub fn predict(angle_deg: f64, params: &[f64; PARAM_COUNT]) -> f64 {
    let (cos2, sin2) = angle_terms(angle_deg);
    term(params[0], params[1], cos2, sin2) + term(params[2], params[3], cos2, sin2)
}

/// Fill `∂f/∂p` at `angle_deg`.
pub fn fill_jacobian_row(angle_deg: f64, params: &[f64; PARAM_COUNT], out: &mut [f64]) {
    let (cos2, sin2) = angle_terms(angle_deg);
    for k in 0..2 {
        let intensity = params[2 * k];
        let gamma = params[2 * k + 1];
        let denom = cos2 + gamma * gamma * sin2;
        // ∂/∂i0 = γ / (π D)
        out[2 * k] = gamma / (PI * denom);
        // ∂/∂γ = i0 (cos²θ - γ² sin²θ) / (π D²)
        out[2 * k + 1] = intensity * (cos2 - gamma * gamma * sin2) / (PI * denom * denom);
    }
}
