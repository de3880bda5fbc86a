//! Bounded nonlinear least-squares fit of the double-Lorentzian model.
//!
//! Given:
//! - an `IcCurve` (angle in degrees, ic in mA)
//! - an angular window (default ±20°)
//!
//! we minimize `½ Σ (f(θ_i; p) - ic_i)²` over `p = [i01, γ1, i02, γ2]` with box
//! constraints, starting from a fixed initial guess.
//!
//! Solver: `tiny_solver`'s Levenberg–Marquardt over a single residual block,
//! with the box constraints set as variable bounds. The optimizer runs in
//! rounds: after each round, parameters resting on a bound whose gradient
//! points outward are held fixed for the next round and released again once
//! the gradient turns inward. A fit is only accepted when the bound-projected
//! gradient passes a scaled stationarity test.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use tiny_solver::Optimizer;
use nalgebra as ts_na;

use crate::domain::{AngleWindow, FIT_WINDOW, IcCurve, LorentzFit, LorentzParams};
use crate::error::AnalysisError;
use crate::models::{PARAM_COUNT, angle_terms, fill_jacobian_row, predict};

const STAGE: &str = "Lorentz fit";

/// Starting point `(i01, γ1, i02, γ2)`.
pub const INITIAL_GUESS: [f64; PARAM_COUNT] = [1.0, 3.0, 1.0, 12.0];
/// Lower bounds `(i01, γ1, i02, γ2)`.
pub const LOWER_BOUNDS: [f64; PARAM_COUNT] = [0.0, 1.0, 0.0, 1.0];
/// Upper bounds `(i01, γ1, i02, γ2)`; linewidths are physically capped.
pub const UPPER_BOUNDS: [f64; PARAM_COUNT] = [f64::INFINITY, 5.0, f64::INFINITY, 15.0];

/// Residual-evaluation budget.
pub const MAX_EVALUATIONS: usize = 1000;

/// Solver variable holding all four parameters.
const VAR: &str = "p";
/// Upper limit on optimizer rounds while the active set settles.
const MAX_ROUNDS: usize = 8;
/// Relative distance at which a parameter counts as resting on its bound.
const BOUND_EPS: f64 = 1e-12;

/// Solver options.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub initial_guess: [f64; PARAM_COUNT],
    pub lower: [f64; PARAM_COUNT],
    pub upper: [f64; PARAM_COUNT],
    pub max_evaluations: usize,
    /// Relative cost decrease below which one optimizer round stops.
    pub ftol: f64,
    /// Largest accepted `|J_jᵀ r| / (‖J_j‖ ‖r‖)` over the free parameters.
    pub gtol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            initial_guess: INITIAL_GUESS,
            lower: LOWER_BOUNDS,
            upper: UPPER_BOUNDS,
            max_evaluations: MAX_EVALUATIONS,
            ftol: 1e-14,
            gtol: 1e-5,
        }
    }
}

/// Fit over the default ±20° window with default options.
pub fn fit_default(curve: &IcCurve) -> Result<LorentzFit, AnalysisError> {
    fit(curve, FIT_WINDOW)
}

/// Fit the samples of `curve` inside `window`.
pub fn fit(curve: &IcCurve, window: AngleWindow) -> Result<LorentzFit, AnalysisError> {
    fit_with(curve, window, &SolverOptions::default())
}

/// Fit with explicit solver options.
pub fn fit_with(
    curve: &IcCurve,
    window: AngleWindow,
    opts: &SolverOptions,
) -> Result<LorentzFit, AnalysisError> {
    let (angles, ic): (Vec<f64>, Vec<f64>) = curve
        .angle
        .iter()
        .zip(curve.ic.iter())
        .filter(|(a, _)| window.contains(**a))
        .map(|(&a, &v)| (a, v))
        .unzip();

    let n = angles.len();
    if n < PARAM_COUNT {
        return Err(AnalysisError::InsufficientData {
            stage: STAGE,
            available: n,
            required: PARAM_COUNT,
        });
    }

    let feasible = (0..PARAM_COUNT).all(|j| {
        opts.lower[j] <= opts.upper[j]
            && opts.lower[j] <= opts.initial_guess[j]
            && opts.initial_guess[j] <= opts.upper[j]
    });
    if !feasible {
        return Err(not_converged(0, "initial guess is outside the parameter bounds"));
    }
    if !ic.iter().chain(angles.iter()).all(|v| v.is_finite()) {
        return Err(not_converged(0, "non-finite samples in the fit window"));
    }

    let problem = Problem {
        angles: &angles,
        ic: &ic,
    };
    let solution = solve(&problem, opts)?;

    let rmse = (solution.residuals.norm_squared() / n as f64).sqrt();
    debug!(
        "{STAGE}: n={n}, p={:?}, rmse={rmse:.6e}, evaluations={}",
        solution.params, solution.evaluations
    );

    Ok(LorentzFit {
        params: LorentzParams::from_array(solution.params),
        n_points: n,
        rmse,
        evaluations: solution.evaluations,
    })
}

fn not_converged(evaluations: usize, reason: &str) -> AnalysisError {
    AnalysisError::FitDidNotConverge {
        evaluations,
        reason: reason.to_string(),
    }
}

/// Window samples with the analytic model, for convergence checks.
struct Problem<'a> {
    angles: &'a [f64],
    ic: &'a [f64],
}

impl Problem<'_> {
    fn residuals(&self, p: &[f64; PARAM_COUNT]) -> DVector<f64> {
        DVector::from_iterator(
            self.angles.len(),
            self.angles
                .iter()
                .zip(self.ic.iter())
                .map(|(&a, &y)| predict(a, p) - y),
        )
    }

    fn jacobian(&self, p: &[f64; PARAM_COUNT]) -> DMatrix<f64> {
        let mut jac = DMatrix::<f64>::zeros(self.angles.len(), PARAM_COUNT);
        let mut row = [0.0; PARAM_COUNT];
        for (i, &a) in self.angles.iter().enumerate() {
            fill_jacobian_row(a, p, &mut row);
            for j in 0..PARAM_COUNT {
                jac[(i, j)] = row[j];
            }
        }
        jac
    }

    /// Parameters on a bound whose descent direction leaves the box.
    fn blocked(&self, p: &[f64; PARAM_COUNT], opts: &SolverOptions) -> [bool; PARAM_COUNT] {
        let grad = self.jacobian(p).transpose() * self.residuals(p);
        let mut out = [false; PARAM_COUNT];
        for j in 0..PARAM_COUNT {
            let lo = opts.lower[j];
            let hi = opts.upper[j];
            // Descent moves along -g.
            let at_lo = p[j] <= lo + BOUND_EPS * (1.0 + lo.abs());
            let at_hi = hi.is_finite() && p[j] >= hi - BOUND_EPS * (1.0 + hi.abs());
            out[j] = (at_lo && grad[j] > 0.0) || (at_hi && grad[j] < 0.0);
        }
        out
    }

    /// Max over unblocked parameters of `|J_jᵀ r| / (‖J_j‖ ‖r‖)`.
    ///
    /// Zero for an exact fit.
    fn stationarity(&self, p: &[f64; PARAM_COUNT], opts: &SolverOptions) -> f64 {
        let r = self.residuals(p);
        let r_norm = r.norm();
        let y_norm = self.ic.iter().map(|v| v * v).sum::<f64>().sqrt();
        if r_norm <= 1e-12 * (1.0 + y_norm) {
            return 0.0;
        }
        let jac = self.jacobian(p);
        let blocked = self.blocked(p, opts);
        jac.column_iter()
            .enumerate()
            .filter(|(j, _)| !blocked[*j])
            .map(|(_, col)| {
                let c_norm = col.norm();
                if c_norm == 0.0 {
                    0.0
                } else {
                    col.dot(&r).abs() / (c_norm * r_norm)
                }
            })
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    cos2: f64,
    sin2: f64,
    ic: f64,
}

/// All window samples as one residual block.
#[derive(Debug, Clone)]
struct LorentzFactor {
    samples: Vec<Sample>,
    calls: Arc<AtomicUsize>,
}

fn lit<T: ts_na::RealField>(v: f64) -> T {
    T::from_f64(v).unwrap_or_else(T::zero)
}

impl<T: ts_na::RealField> tiny_solver::factors::Factor<T> for LorentzFactor {
    fn residual_func(&self, params: &[ts_na::DVector<T>]) -> ts_na::DVector<T> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let p = &params[0];
        let pi = T::pi();
        let term = |i0: &T, gamma: &T, s: &Sample| -> T {
            i0.clone() * gamma.clone()
                / (pi.clone() * (lit::<T>(s.cos2) + gamma.clone() * gamma.clone() * lit::<T>(s.sin2)))
        };
        ts_na::DVector::<T>::from_iterator(
            self.samples.len(),
            self.samples
                .iter()
                .map(|s| term(&p[0], &p[1], s) + term(&p[2], &p[3], s) - lit::<T>(s.ic)),
        )
    }
}

struct Solution {
    params: [f64; PARAM_COUNT],
    residuals: DVector<f64>,
    evaluations: usize,
}

fn solve(problem: &Problem<'_>, opts: &SolverOptions) -> Result<Solution, AnalysisError> {
    let calls = Arc::new(AtomicUsize::new(0));
    let factor = LorentzFactor {
        samples: problem
            .angles
            .iter()
            .zip(problem.ic.iter())
            .map(|(&a, &ic)| {
                let (cos2, sin2) = angle_terms(a);
                Sample { cos2, sin2, ic }
            })
            .collect(),
        calls: Arc::clone(&calls),
    };

    let mut p = opts.initial_guess;
    let mut pinned = [false; PARAM_COUNT];
    let mut best_cost = 0.5 * problem.residuals(&p).norm_squared();

    for round in 0..MAX_ROUNDS {
        let used = calls.load(Ordering::Relaxed);
        if used >= opts.max_evaluations {
            return Err(not_converged(used, "evaluation budget exhausted"));
        }
        let max_iteration = ((opts.max_evaluations - used) / 2).max(1);

        let next = solve_round(&factor, &p, &pinned, opts, max_iteration)
            .ok_or_else(|| not_converged(calls.load(Ordering::Relaxed), "optimizer failed"))?;
        let evaluations = calls.load(Ordering::Relaxed);

        let r = problem.residuals(&next);
        if !r.iter().all(|v| v.is_finite()) {
            return Err(not_converged(evaluations, "non-finite residuals"));
        }
        let cost = 0.5 * r.norm_squared();
        let pg = problem.stationarity(&next, opts);
        trace!("round {round}: p={next:?}, cost={cost:.6e}, |pg|={pg:.3e}, pinned={pinned:?}");

        if pg <= opts.gtol {
            return Ok(Solution {
                params: next,
                residuals: r,
                evaluations,
            });
        }
        if evaluations >= opts.max_evaluations {
            return Err(not_converged(evaluations, "evaluation budget exhausted"));
        }

        let blocked = problem.blocked(&next, opts);
        if blocked == pinned && cost >= best_cost {
            return Err(not_converged(evaluations, "no further decrease at a non-stationary point"));
        }
        best_cost = best_cost.min(cost);
        pinned = blocked;
        p = next;
    }

    Err(not_converged(
        calls.load(Ordering::Relaxed),
        "active bounds did not settle",
    ))
}

/// One optimizer run from `start`, with `pinned` parameters held fixed.
fn solve_round(
    factor: &LorentzFactor,
    start: &[f64; PARAM_COUNT],
    pinned: &[bool; PARAM_COUNT],
    opts: &SolverOptions,
    max_iteration: usize,
) -> Option<[f64; PARAM_COUNT]> {
    let mut problem = tiny_solver::Problem::new();
    problem.add_residual_block(factor.samples.len(), &[VAR], Box::new(factor.clone()), None);
    for j in 0..PARAM_COUNT {
        if pinned[j] {
            problem.fix_variable(VAR, j);
        } else {
            problem.set_variable_bounds(VAR, j, opts.lower[j], opts.upper[j]);
        }
    }

    let mut initial_values = HashMap::<String, ts_na::DVector<f64>>::new();
    initial_values.insert(VAR.to_string(), ts_na::DVector::<f64>::from_column_slice(start));

    let optimizer = tiny_solver::LevenbergMarquardtOptimizer::default();
    let options = tiny_solver::OptimizerOptions {
        max_iteration,
        verbosity_level: 0,
        min_rel_error_decrease_threshold: opts.ftol,
        min_abs_error_decrease_threshold: 1e-30,
        min_error_threshold: 1e-30,
        ..Default::default()
    };

    let result = optimizer.optimize(&problem, &initial_values, Some(options))?;
    let v = result.get(VAR)?;
    if v.len() != PARAM_COUNT {
        return None;
    }
    let mut out = [0.0; PARAM_COUNT];
    for j in 0..PARAM_COUNT {
        if !v[j].is_finite() {
            return None;
        }
        out[j] = if pinned[j] {
            start[j]
        } else {
            v[j].clamp(opts.lower[j], opts.upper[j])
        };
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_curve(true_p: [f64; PARAM_COUNT]) -> IcCurve {
        let angle: Vec<f64> = (0..59).map(|i| -29.0 + i as f64).collect();
        let ic = angle.iter().map(|&a| predict(a, &true_p)).collect();
        IcCurve { angle, ic }
    }

    /// Model curve with a repeatable ±1% ripple.
    fn rippled_curve(true_p: [f64; PARAM_COUNT]) -> IcCurve {
        let mut curve = synthetic_curve(true_p);
        for (i, v) in curve.ic.iter_mut().enumerate() {
            *v *= 1.0 + 0.01 * (1.7 * i as f64).sin();
        }
        curve
    }

    fn window_problem(curve: &IcCurve) -> (Vec<f64>, Vec<f64>) {
        curve
            .angle
            .iter()
            .zip(curve.ic.iter())
            .filter(|(a, _)| FIT_WINDOW.contains(**a))
            .map(|(&a, &v)| (a, v))
            .unzip()
    }

    fn assert_close(actual: f64, expected: f64, rel: f64, what: &str) {
        assert!(
            (actual - expected).abs() <= rel * expected.abs(),
            "{what}: got {actual}, expected {expected}"
        );
    }

    /// The returned point is stationary on the box and a restart from it
    /// finds nothing better.
    fn assert_bounded_optimum(curve: &IcCurve) -> LorentzFit {
        let opts = SolverOptions::default();
        let fit = fit_default(curve).unwrap();
        let p = fit.params.to_array();
        for j in 0..PARAM_COUNT {
            assert!(opts.lower[j] <= p[j] && p[j] <= opts.upper[j], "{p:?}");
        }

        let (angles, ic) = window_problem(curve);
        let problem = Problem {
            angles: &angles,
            ic: &ic,
        };
        assert!(problem.stationarity(&p, &opts) <= opts.gtol);

        let restart = SolverOptions {
            initial_guess: p,
            ..SolverOptions::default()
        };
        let again = fit_with(curve, FIT_WINDOW, &restart).unwrap();
        assert!(again.rmse >= fit.rmse * (1.0 - 1e-6), "{} < {}", again.rmse, fit.rmse);
        fit
    }

    #[test]
    fn recovers_noise_free_parameters() {
        let truth = [1.2, 3.5, 0.9, 11.0];
        let fit = fit_default(&synthetic_curve(truth)).unwrap();

        let got = fit.params.to_array();
        for (j, name) in ["i01", "gamma1", "i02", "gamma2"].iter().enumerate() {
            assert_close(got[j], truth[j], 1e-2, name);
        }
        assert_eq!(fit.n_points, 39);
        assert!(fit.rmse < 1e-6);
        assert!(fit.evaluations > 0);
    }

    #[test]
    fn narrow_width_beyond_its_cap_is_fitted_to_a_bounded_optimum() {
        // gamma1 = 7 lies above its [1, 5] range.
        let fit = assert_bounded_optimum(&synthetic_curve([1.0, 7.0, 0.5, 12.0]));
        let p = fit.params;
        assert!((1.0..=5.0).contains(&p.gamma1));
        assert!(p.i01 >= 0.0 && p.i02 >= 0.0);
    }

    #[test]
    fn wide_width_beyond_its_cap_is_fitted_to_a_bounded_optimum() {
        // gamma2 = 18 lies above its [1, 15] range, with ripple on top.
        let fit = assert_bounded_optimum(&rippled_curve([1.0, 3.0, 0.5, 18.0]));
        assert!(fit.params.gamma2 <= 15.0);
    }

    #[test]
    fn rippled_interior_fit_is_stationary() {
        let fit = assert_bounded_optimum(&rippled_curve([1.2, 3.5, 0.9, 11.0]));
        assert_close(fit.params.gamma2, 11.0, 0.2, "gamma2");
    }

    #[test]
    fn bound_blocks_only_when_descent_leaves_the_box() {
        let opts = SolverOptions::default();
        let at_cap = [1.0, 3.0, 0.5, 15.0];

        // Optimum inside the box: the cap does not block gamma2.
        let curve = synthetic_curve([1.0, 3.0, 0.5, 12.0]);
        let (angles, ic) = window_problem(&curve);
        let inside = Problem {
            angles: &angles,
            ic: &ic,
        };
        assert!(!inside.blocked(&at_cap, &opts)[3]);

        // Optimum beyond the cap: gamma2 is held there.
        let curve = synthetic_curve([1.0, 3.0, 0.5, 18.0]);
        let (angles, ic) = window_problem(&curve);
        let beyond = Problem {
            angles: &angles,
            ic: &ic,
        };
        assert_eq!(beyond.blocked(&at_cap, &opts), [false, false, false, true]);
    }

    #[test]
    fn too_few_points_in_window() {
        let curve = IcCurve {
            angle: vec![-25.0, -10.0, 0.0, 10.0, 25.0],
            ic: vec![1.0; 5],
        };
        let err = fit_default(&curve).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                stage: STAGE,
                available: 3,
                required: 4
            }
        );
    }

    #[test]
    fn empty_window_is_insufficient_data() {
        let curve = IcCurve {
            angle: vec![22.0, 24.0, 26.0, 28.0, 29.0],
            ic: vec![1.0; 5],
        };
        assert!(matches!(
            fit_default(&curve),
            Err(AnalysisError::InsufficientData { available: 0, .. })
        ));
    }

    #[test]
    fn tiny_budget_does_not_converge() {
        let opts = SolverOptions {
            max_evaluations: 2,
            ..SolverOptions::default()
        };
        let err = fit_with(&synthetic_curve([2.0, 2.0, 0.4, 9.0]), FIT_WINDOW, &opts).unwrap_err();
        assert!(matches!(err, AnalysisError::FitDidNotConverge { evaluations, .. } if evaluations >= 2));
    }

    #[test]
    fn non_finite_data_does_not_converge() {
        let mut curve = synthetic_curve(INITIAL_GUESS);
        curve.ic[30] = f64::NAN;
        assert!(matches!(
            fit_default(&curve),
            Err(AnalysisError::FitDidNotConverge { evaluations: 0, .. })
        ));
    }

    #[test]
    fn infeasible_initial_guess_is_rejected() {
        let opts = SolverOptions {
            initial_guess: [1.0, 6.0, 1.0, 12.0],
            ..SolverOptions::default()
        };
        let err = fit_with(&synthetic_curve(INITIAL_GUESS), FIT_WINDOW, &opts).unwrap_err();
        assert!(matches!(err, AnalysisError::FitDidNotConverge { evaluations: 0, .. }));
    }
}
