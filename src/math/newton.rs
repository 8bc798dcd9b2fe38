//! Scalar root finding.
//!
//! Two flavours are needed by the polymer models:
//! - `newton_raphson` when the derivative is known analytically (inverse Langevin)
//! - `secant` when it is not (the FJC-PEG force multiplier)
//!
//! Neither routine prints anything; progress goes to the `log` facade at trace level.

use crate::error::ConvergenceError;

/// Stopping rules shared by both solvers.
#[derive(Debug, Clone, Copy)]
pub struct NewtonOptions {
    pub max_iterations: usize,
    /// Converged when `|step| <= rel_tol * |x| + abs_tol`.
    pub rel_tol: f64,
    pub abs_tol: f64,
    /// Also converged when `|f(x)| <= f_tol`.
    pub f_tol: f64,
}

impl Default for NewtonOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            rel_tol: 1e-13,
            abs_tol: 0.0,
            f_tol: 0.0,
        }
    }
}

impl NewtonOptions {
    fn step_converged(&self, step: f64, x: f64) -> bool {
        step.abs() <= self.rel_tol * x.abs() + self.abs_tol
    }
}

/// Solve `func(x) = 0` with Newton-Raphson.
///
/// # Errors
/// - [`ConvergenceError::NonFinite`] if any evaluation is not finite
/// - [`ConvergenceError::ZeroDerivative`] if the derivative vanishes before convergence
/// - [`ConvergenceError::Iterations`] if the iteration cap is reached
pub fn newton_raphson(
    func: impl Fn(f64) -> f64,
    der: impl Fn(f64) -> f64,
    start: f64,
    opts: &NewtonOptions,
) -> Result<f64, ConvergenceError> {
    let mut x = start;

    for iter in 0..opts.max_iterations {
        let f_eval = func(x);
        if !f_eval.is_finite() {
            return Err(ConvergenceError::NonFinite);
        }
        if f_eval == 0.0 || f_eval.abs() <= opts.f_tol {
            return Ok(x);
        }

        let d_eval = der(x);
        if !d_eval.is_finite() {
            return Err(ConvergenceError::NonFinite);
        }
        if d_eval == 0.0 {
            return Err(ConvergenceError::ZeroDerivative);
        }

        let step = f_eval / d_eval;
        x -= step;
        log::trace!("newton iter {iter}: x={x:e} f={f_eval:e} step={step:e}");

        if !x.is_finite() {
            return Err(ConvergenceError::NonFinite);
        }
        if opts.step_converged(step, x) {
            return Ok(x);
        }
    }

    Err(ConvergenceError::Iterations)
}

/// Solve `func(x) = 0` with the secant method.
///
/// The second starting point is `x0 * (1 + 1e-4) ± 1e-4`, the same choice
/// scipy's derivative-free `newton` makes. If the two most recent function
/// values coincide, the iteration cannot continue and the midpoint of the two
/// abscissae is returned.
pub fn secant(
    func: impl Fn(f64) -> f64,
    x0: f64,
    opts: &NewtonOptions,
) -> Result<f64, ConvergenceError> {
    let eps = 1e-4;
    let mut p0 = x0;
    let mut p1 = x0 * (1.0 + eps) + if x0 >= 0.0 { eps } else { -eps };
    let mut q0 = func(p0);
    let mut q1 = func(p1);
    if !(q0.is_finite() && q1.is_finite()) {
        return Err(ConvergenceError::NonFinite);
    }
    if q0 == 0.0 {
        return Ok(p0);
    }

    for iter in 0..opts.max_iterations {
        if q1 == 0.0 || q1.abs() <= opts.f_tol {
            return Ok(p1);
        }
        if q1 == q0 {
            log::debug!("secant: flat secant at p0={p0:e}, p1={p1:e}; returning midpoint");
            return Ok(0.5 * (p0 + p1));
        }

        let p = p1 - q1 * (p1 - p0) / (q1 - q0);
        log::trace!("secant iter {iter}: p={p:e} q={q1:e}");
        if !p.is_finite() {
            return Err(ConvergenceError::NonFinite);
        }
        if opts.step_converged(p - p1, p) {
            return Ok(p);
        }

        p0 = p1;
        q0 = q1;
        p1 = p;
        q1 = func(p1);
        if !q1.is_finite() {
            return Err(ConvergenceError::NonFinite);
        }
    }

    Err(ConvergenceError::Iterations)
}
