//! Generic nonlinear least-squares fitting of a model to a data vector.
//!
//! Given:
//! - a data vector `d_i` (length `m`)
//! - a model `M(p)` returning a prediction of the same length
//! - model-specific heuristics for the initial guess and parameter scales
//!
//! we minimize `sum_i ((d_i - M(p)_i) / s_d)^2` with Levenberg–Marquardt, where
//! `s_d` is the data scale factor.
//!
//! Rescaling (`rescale = true`):
//! - `s_d` is the first non-zero of `[std(d), max(d) - min(d), |max(d)|, 1]`
//! - parameters are divided by their initial guesses (zeros become one), so the
//!   optimizer works on values near one whatever the physical magnitude
//!
//! The covariance estimate is `(J^T J)^-1 * SSE / (m - n)` at the solution,
//! reported in reparametrized parameter units.
//!
//! A trial point where the model fails or returns non-finite values gets a
//! huge finite residual, so the minimizer rejects the step and shrinks its
//! trust region instead of aborting.

use std::cell::Cell;
use std::time::Instant;

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::{DMatrix, DVector, Dyn, Owned};

use crate::domain::{FitDiagnostics, FitOutcome};
use crate::error::{ConvergenceError, FitError};
use crate::fit::handoff::DiagnosticsSender;
use crate::math::{LmOptions, LmStatus};

/// Residual entry reported for a trial point the model cannot evaluate.
const REJECTED_RESIDUAL: f64 = 1e150;

/// What a model must provide to be fitted by [`ModelFitter`].
pub trait FitModel {
    /// Number of free parameters.
    fn param_count(&self) -> usize;

    /// Physically motivated starting point for the free parameters.
    fn guess_initial_params(&self, data: &[f64]) -> Result<Vec<f64>, FitError>;

    /// Characteristic magnitude of each free parameter at `params`.
    fn guess_scale(&self, params: &[f64]) -> Vec<f64>;

    /// Prediction for the free parameters `params`, one value per data point.
    fn model(&self, params: &[f64]) -> Result<Vec<f64>, ConvergenceError>;
}

/// Fits [`FitModel`]s to one data vector.
#[derive(Debug, Clone)]
pub struct ModelFitter<'a> {
    data: &'a [f64],
    rescale: bool,
    data_scale_factor: f64,
    options: LmOptions,
    noise_sigma: Option<f64>,
}

impl<'a> ModelFitter<'a> {
    pub fn new(data: &'a [f64], rescale: bool) -> Self {
        let data_scale_factor = if rescale { data_scale_factor(data) } else { 1.0 };
        Self {
            data,
            rescale,
            data_scale_factor,
            options: LmOptions::default(),
            noise_sigma: None,
        }
    }

    pub fn with_options(mut self, options: LmOptions) -> Self {
        self.options = options;
        self
    }

    /// Expected noise in data units; enables `FitDiagnostics::quality`.
    pub fn with_noise_sigma(mut self, noise_sigma: Option<f64>) -> Self {
        self.noise_sigma = noise_sigma;
        self
    }

    pub fn data_scale_factor(&self) -> f64 {
        self.data_scale_factor
    }

    /// Fit `model` to the data.
    ///
    /// # Errors
    /// - [`FitError::UnderDetermined`] with fewer data points than free parameters
    /// - [`FitError::InvalidInput`] for non-finite data or unusable scales
    /// - [`FitError::PoorFit`] if the minimizer does not converge or the
    ///   solution is not finite
    pub fn fit<M: FitModel + ?Sized>(&self, model: &M) -> Result<FitOutcome, FitError> {
        let m = self.data.len();
        let n = model.param_count();
        if m < n {
            return Err(FitError::UnderDetermined { points: m, params: n });
        }
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput("data contains non-finite values".into()));
        }

        let initial = model.guess_initial_params(self.data)?;
        if initial.len() != n || initial.iter().any(|v| !v.is_finite()) {
            return Err(FitError::PoorFit(format!(
                "initial guess {initial:?} is not a finite {n}-vector"
            )));
        }
        let scale = model.guess_scale(&initial);
        if scale.len() != n || scale.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(FitError::InvalidInput(format!(
                "parameter scales must be finite and positive: {scale:?}"
            )));
        }

        // Optimizer coordinates are `active = params / factors`.
        let factors: Vec<f64> = if self.rescale {
            initial.iter().map(|&v| if v == 0.0 { 1.0 } else { v }).collect()
        } else {
            vec![1.0; n]
        };
        let start = DVector::from_iterator(n, initial.iter().zip(&factors).map(|(p, f)| p / f));
        let active_scale = DVector::from_iterator(n, scale.iter().zip(&factors).map(|(s, f)| s / f.abs()));

        log::debug!(
            "fitting {n} parameters to {m} points: initial {initial:?}, scale {scale:?}, data scale {:e}",
            self.data_scale_factor
        );

        let dsf = self.data_scale_factor;
        let problem = RescaledProblem {
            model,
            data: self.data,
            factors: &factors,
            scale: active_scale,
            data_scale_factor: dsf,
            active: start.clone(),
            deadline: self.options.max_duration.map(|d| Instant::now() + d),
            evaluations: Cell::new(0),
            jacobians: Cell::new(0),
            timed_out: Cell::new(false),
        };
        if problem.residual_at(&start).is_none() {
            return Err(FitError::PoorFit(format!(
                "model cannot be evaluated at the initial guess {initial:?}"
            )));
        }

        let (problem, report) = self.options.solver().minimize(problem);
        let status = LmStatus::from_termination(&report.termination, problem.timed_out.get())
            .map_err(FitError::InvalidInput)?;
        let iterations = problem.jacobians.get();
        log::debug!(
            "lm stopped after {iterations} iterations ({} evaluations): {}",
            report.number_of_evaluations,
            status.message()
        );
        if !status.is_converged() {
            return Err(FitError::PoorFit(format!(
                "minimizer stopped after {iterations} iterations: {}",
                status.message()
            )));
        }

        let active = problem.params();
        let fit_params: Vec<f64> = active.iter().zip(&factors).map(|(a, f)| a * f).collect();
        if fit_params.iter().any(|v| !v.is_finite()) {
            return Err(FitError::PoorFit(format!("non-finite solution {fit_params:?}")));
        }
        let Some(residual) = problem.residual_at(&active) else {
            return Err(FitError::PoorFit(format!(
                "model cannot be evaluated at the solution {fit_params:?}"
            )));
        };
        let jacobian = problem.jacobian_at(&active, &residual);

        let scaled_sse = residual.norm_squared();
        let sse = scaled_sse * dsf * dsf;
        let rmse = (sse / m as f64).sqrt();
        let covariance = jacobian
            .as_ref()
            .and_then(|jac| covariance(jac, scaled_sse, m, &factors));
        let standard_errors = covariance
            .as_ref()
            .map(|c| (0..n).map(|i| c[i][i].max(0.0).sqrt()).collect());

        let diagnostics = FitDiagnostics {
            rescaled: self.rescale,
            initial_params: initial,
            scale,
            data_scale_factor: dsf,
            active_params: active.iter().copied().collect(),
            fit_params: fit_params.clone(),
            covariance,
            standard_errors,
            status,
            iterations,
            evaluations: problem.evaluations.get(),
            sse,
            rmse,
            quality: self.noise_sigma.map(|s| rmse / s),
        };
        log::debug!(
            "fit converged ({:?}) after {} iterations: params {fit_params:?}, rmse {rmse:e}",
            diagnostics.status,
            diagnostics.iterations
        );

        Ok(FitOutcome {
            params: fit_params,
            diagnostics,
        })
    }

    /// [`fit`](Self::fit), then publish the diagnostics record to `sender`.
    ///
    /// Nothing is published when the fit fails.
    pub fn fit_reporting<M: FitModel + ?Sized>(
        &self,
        model: &M,
        sender: &DiagnosticsSender,
    ) -> Result<FitOutcome, FitError> {
        let outcome = self.fit(model)?;
        sender.publish(outcome.diagnostics.clone())?;
        Ok(outcome)
    }
}

/// A [`FitModel`] seen in optimizer coordinates `active = params / factors`,
/// with residuals `(d - M(p)) / s_d`.
struct RescaledProblem<'a, M: FitModel + ?Sized> {
    model: &'a M,
    data: &'a [f64],
    factors: &'a [f64],
    /// Characteristic size of each active coordinate, for difference steps.
    scale: DVector<f64>,
    data_scale_factor: f64,
    active: DVector<f64>,
    deadline: Option<Instant>,
    evaluations: Cell<usize>,
    jacobians: Cell<usize>,
    timed_out: Cell<bool>,
}

impl<M: FitModel + ?Sized> RescaledProblem<'_, M> {
    /// Scaled residual at `active`, `None` where the model is unusable.
    fn residual_at(&self, active: &DVector<f64>) -> Option<DVector<f64>> {
        self.evaluations.set(self.evaluations.get() + 1);
        let m = self.data.len();
        let params: Vec<f64> = active.iter().zip(self.factors).map(|(a, f)| a * f).collect();
        let pred = match self.model.model(&params) {
            Ok(pred) => pred,
            Err(err) => {
                log::trace!("model evaluation failed at {params:?}: {err}");
                return None;
            }
        };
        if pred.len() != m {
            log::warn!("model returned {} values for {m} data points", pred.len());
            return None;
        }
        let r = DVector::from_iterator(
            m,
            self.data.iter().zip(&pred).map(|(d, p)| (d - p) / self.data_scale_factor),
        );
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    /// Forward-difference Jacobian at `active`, stepping backwards along a
    /// coordinate whose forward point is unusable.
    fn jacobian_at(&self, active: &DVector<f64>, r: &DVector<f64>) -> Option<DMatrix<f64>> {
        let (m, n) = (r.len(), active.len());
        let sqrt_eps = f64::EPSILON.sqrt();
        let mut jac = DMatrix::<f64>::zeros(m, n);

        for j in 0..n {
            let mut h = sqrt_eps * active[j].abs().max(self.scale[j]);
            if h == 0.0 {
                h = sqrt_eps;
            }
            let mut shifted = active.clone();
            shifted[j] += h;
            let (r_shift, h) = match self.residual_at(&shifted) {
                Some(r_shift) => (r_shift, h),
                None => {
                    shifted[j] = active[j] - h;
                    (self.residual_at(&shifted)?, -h)
                }
            };
            jac.set_column(j, &((r_shift - r) / h));
        }
        Some(jac)
    }
}

impl<M: FitModel + ?Sized> LeastSquaresProblem<f64, Dyn, Dyn> for RescaledProblem<'_, M> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.active.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.active.clone()
    }

    /// `None` only once the deadline has passed, which aborts the solve.
    fn residuals(&self) -> Option<DVector<f64>> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.timed_out.set(true);
                return None;
            }
        }
        Some(
            self.residual_at(&self.active)
                .unwrap_or_else(|| DVector::from_element(self.data.len(), REJECTED_RESIDUAL)),
        )
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        self.jacobians.set(self.jacobians.get() + 1);
        let r = self.residual_at(&self.active)?;
        self.jacobian_at(&self.active, &r)
    }
}

/// First non-zero of `[std(d), max(d) - min(d), |max(d)|, 1]`.
pub fn data_scale_factor(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 1.0;
    }
    let len = data.len() as f64;
    let mean = data.iter().sum::<f64>() / len;
    let std = (data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / len).sqrt();
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = data.iter().copied().fold(f64::INFINITY, f64::min);

    [std, max - min, max.abs()]
        .into_iter()
        .find(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(1.0)
}

/// `(J^T J)^-1 * s^2` with `s^2 = SSE / (m - n)`, mapped from optimizer
/// coordinates back to parameter units.
fn covariance(jac: &DMatrix<f64>, scaled_sse: f64, m: usize, factors: &[f64]) -> Option<Vec<Vec<f64>>> {
    let n = factors.len();
    if m <= n {
        return None;
    }
    let jtj = jac.transpose() * jac;
    let inv = jtj.try_inverse()?;
    let s2 = scaled_sse / (m - n) as f64;

    let cov: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| inv[(i, j)] * s2 * factors[i] * factors[j]).collect())
        .collect();
    cov.iter().flatten().all(|v| v.is_finite()).then_some(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::handoff::diagnostics_slot;

    /// `y = a exp(-k t)` with free `(a, k)`.
    struct Decay {
        t: Vec<f64>,
    }

    impl FitModel for Decay {
        fn param_count(&self) -> usize {
            2
        }

        fn guess_initial_params(&self, data: &[f64]) -> Result<Vec<f64>, FitError> {
            Ok(vec![data[0], 1.0])
        }

        fn guess_scale(&self, params: &[f64]) -> Vec<f64> {
            params.iter().map(|p| p.abs().max(1e-3)).collect()
        }

        fn model(&self, params: &[f64]) -> Result<Vec<f64>, ConvergenceError> {
            Ok(self.t.iter().map(|&t| params[0] * (-params[1] * t).exp()).collect())
        }
    }

    fn decay_data() -> (Decay, Vec<f64>) {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y = t.iter().map(|&t| 4e-11 * (-0.7 * t).exp()).collect();
        (Decay { t }, y)
    }

    #[test]
    fn data_scale_factor_picks_first_nonzero() {
        assert!((data_scale_factor(&[1.0, 3.0]) - 1.0).abs() < 1e-15);
        assert_eq!(data_scale_factor(&[2.5, 2.5]), 2.5);
        assert_eq!(data_scale_factor(&[0.0, 0.0]), 1.0);
        assert_eq!(data_scale_factor(&[]), 1.0);
    }

    #[test]
    fn fits_tiny_magnitudes_with_rescaling() {
        let (model, y) = decay_data();
        let outcome = ModelFitter::new(&y, true).fit(&model).unwrap();

        assert!((outcome.params[0] - 4e-11).abs() < 1e-6 * 4e-11, "a = {:e}", outcome.params[0]);
        assert!((outcome.params[1] - 0.7).abs() < 1e-6, "k = {}", outcome.params[1]);

        let d = &outcome.diagnostics;
        assert!(d.rescaled);
        assert!(d.status.is_converged());
        assert_eq!(d.initial_params, vec![4e-11, 1.0]);
        assert!((d.active_params[1] - 0.7).abs() < 1e-6);
        assert!(d.rmse < 1e-16, "rmse {:e}", d.rmse);
        assert!(d.quality.is_none());
    }

    #[test]
    fn covariance_reflects_noise() {
        let (model, mut y) = decay_data();
        // Deterministic alternating perturbation.
        for (i, v) in y.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 1e-13 } else { -1e-13 };
        }
        let outcome = ModelFitter::new(&y, true)
            .with_noise_sigma(Some(1e-13))
            .fit(&model)
            .unwrap();

        let d = &outcome.diagnostics;
        let se = d.standard_errors.as_ref().unwrap();
        assert!(se.iter().all(|v| v.is_finite() && *v > 0.0), "se {se:?}");
        assert!(se[1] < 0.05, "rate uncertainty {}", se[1]);
        let cov = d.covariance.as_ref().unwrap();
        let norm = (cov[0][0] * cov[1][1]).sqrt();
        assert!((cov[0][1] - cov[1][0]).abs() <= 1e-9 * norm);
        let q = d.quality.unwrap();
        assert!(q > 0.5 && q < 1.5, "quality {q}");
    }

    #[test]
    fn under_determined_fails_before_fitting() {
        let model = Decay { t: vec![0.0] };
        let err = ModelFitter::new(&[1.0], true).fit(&model).unwrap_err();
        assert_eq!(err, FitError::UnderDetermined { points: 1, params: 2 });
    }

    #[test]
    fn iteration_cap_is_a_poor_fit() {
        let (model, y) = decay_data();
        let opts = LmOptions {
            max_iterations: 1,
            ..LmOptions::default()
        };
        let err = ModelFitter::new(&y, true).with_options(opts).fit(&model).unwrap_err();
        assert!(matches!(err, FitError::PoorFit(_)), "{err:?}");
    }

    /// `y = ln p`, undefined for `p <= 0`.
    struct Log;

    impl FitModel for Log {
        fn param_count(&self) -> usize {
            1
        }

        fn guess_initial_params(&self, _data: &[f64]) -> Result<Vec<f64>, FitError> {
            Ok(vec![1.0])
        }

        fn guess_scale(&self, _params: &[f64]) -> Vec<f64> {
            vec![1.0]
        }

        fn model(&self, params: &[f64]) -> Result<Vec<f64>, ConvergenceError> {
            if params[0] <= 0.0 {
                return Err(ConvergenceError::NonFinite);
            }
            Ok(vec![params[0].ln(); 2])
        }
    }

    #[test]
    fn unusable_trial_points_are_rejected() {
        // The first Gauss-Newton step from p = 1 lands at p < 0.
        let y = vec![0.04f64.ln(); 2];
        let outcome = ModelFitter::new(&y, true).fit(&Log).unwrap();
        assert!((outcome.params[0] - 0.04).abs() < 1e-6, "p = {}", outcome.params[0]);
        assert!(outcome.diagnostics.status.is_converged());
        assert!(outcome.diagnostics.evaluations > outcome.diagnostics.iterations);
    }

    #[test]
    fn unusable_start_is_a_poor_fit() {
        struct Broken;
        impl FitModel for Broken {
            fn param_count(&self) -> usize {
                1
            }
            fn guess_initial_params(&self, _data: &[f64]) -> Result<Vec<f64>, FitError> {
                Ok(vec![-1.0])
            }
            fn guess_scale(&self, _params: &[f64]) -> Vec<f64> {
                vec![1.0]
            }
            fn model(&self, params: &[f64]) -> Result<Vec<f64>, ConvergenceError> {
                Log.model(params)
            }
        }
        let err = ModelFitter::new(&[1.0, 2.0], true).fit(&Broken).unwrap_err();
        assert!(
            matches!(&err, FitError::PoorFit(msg) if msg.contains("initial guess")),
            "{err:?}"
        );
    }

    #[test]
    fn time_cap_is_a_poor_fit() {
        let (model, y) = decay_data();
        let opts = LmOptions {
            max_duration: Some(std::time::Duration::ZERO),
            ..LmOptions::default()
        };
        let err = ModelFitter::new(&y, true).with_options(opts).fit(&model).unwrap_err();
        assert!(
            matches!(&err, FitError::PoorFit(msg) if msg.contains("wall-clock")),
            "{err:?}"
        );
    }

    #[test]
    fn fit_reporting_publishes_one_record() {
        let (model, y) = decay_data();
        let (tx, rx) = diagnostics_slot();
        let outcome = ModelFitter::new(&y, true).fit_reporting(&model, &tx).unwrap();

        let d = rx.try_take().expect("diagnostics published");
        assert_eq!(d, outcome.diagnostics);
        assert!(rx.try_take().is_none());
    }
}
