//! Levenberg–Marquardt settings and stopping reasons.
//!
//! The minimizer itself is the MINPACK port in the `levenberg_marquardt`
//! crate. This module owns what the rest of the crate sees of it:
//! - [`LmOptions`], the serializable knobs, turned into a configured solver
//!   by [`LmOptions::solver`]
//! - [`LmStatus`], a stable, serializable name for the crate's
//!   `TerminationReason`, recorded in fit diagnostics

use std::time::Duration;

use levenberg_marquardt::{LevenbergMarquardt, TerminationReason};
use serde::{Deserialize, Serialize};

/// Solver settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LmOptions {
    /// Iteration budget. The solver allows `max_iterations * (n + 1)`
    /// residual evaluations for `n` parameters.
    pub max_iterations: usize,
    /// Relative reduction tolerance on the cost.
    pub ftol: f64,
    /// Relative tolerance on the scaled step.
    pub xtol: f64,
    /// Cosine tolerance between residual and Jacobian columns.
    pub gtol: f64,
    /// Optional wall-clock cap.
    pub max_duration: Option<Duration>,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            max_duration: None,
        }
    }
}

impl LmOptions {
    /// A solver configured with these tolerances.
    ///
    /// Parameters are scaled by the running maximum of the Jacobian column
    /// norms, so the damping does not depend on parameter units.
    pub fn solver(&self) -> LevenbergMarquardt<f64> {
        LevenbergMarquardt::new()
            .with_ftol(self.ftol)
            .with_xtol(self.xtol)
            .with_gtol(self.gtol)
            .with_patience(self.max_iterations.max(1))
            .with_scale_diag(true)
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmStatus {
    /// The residual vanished exactly.
    ExactFit,
    /// Actual and predicted relative cost reductions are below `ftol`.
    CostReduction,
    /// The scaled step is below `xtol`.
    StepSize,
    /// The residual is orthogonal to the Jacobian columns within `gtol`.
    Gradient,
    /// No step reduces the cost any further at machine precision.
    MachinePrecision,
    /// Stopped by the iteration cap.
    IterationLimit,
    /// Stopped by the wall-clock cap.
    TimeLimit,
    /// The residual or Jacobian could not be evaluated.
    EvaluationFailed,
    /// The solver hit a non-finite intermediate value.
    NumericalFailure,
}

impl LmStatus {
    /// Map the solver's termination reason.
    ///
    /// `timed_out` tells a deadline abort apart from other aborts raised by
    /// the problem itself. Usage issues (no parameters, no residuals, wrong
    /// dimensions) are errors in the caller rather than stopping reasons and
    /// come back as `Err` with a description.
    pub fn from_termination(reason: &TerminationReason, timed_out: bool) -> Result<Self, String> {
        if reason.was_usage_issue() {
            return Err(format!("least-squares problem is malformed: {reason:?}"));
        }
        Ok(match reason {
            TerminationReason::ResidualsZero => LmStatus::ExactFit,
            TerminationReason::Converged { ftol: true, .. } => LmStatus::CostReduction,
            TerminationReason::Converged { .. } => LmStatus::StepSize,
            TerminationReason::Orthogonal => LmStatus::Gradient,
            TerminationReason::NoImprovementPossible(_) => LmStatus::MachinePrecision,
            TerminationReason::LostPatience => LmStatus::IterationLimit,
            TerminationReason::User(_) if timed_out => LmStatus::TimeLimit,
            TerminationReason::User(_) => LmStatus::EvaluationFailed,
            TerminationReason::Numerical(_) => LmStatus::NumericalFailure,
            other => return Err(format!("unexpected termination: {other:?}")),
        })
    }

    /// Whether the parameters at this status are a usable solution.
    ///
    /// `MachinePrecision` counts: the cost cannot be reduced further, which
    /// is what the tolerances ask for, only tighter.
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            LmStatus::ExactFit
                | LmStatus::CostReduction
                | LmStatus::StepSize
                | LmStatus::Gradient
                | LmStatus::MachinePrecision
        )
    }

    pub fn message(self) -> &'static str {
        match self {
            LmStatus::ExactFit => "residual is exactly zero",
            LmStatus::CostReduction => "relative reduction in the sum of squares is at most ftol",
            LmStatus::StepSize => "relative error between two consecutive iterates is at most xtol",
            LmStatus::Gradient => "residual is orthogonal to the Jacobian columns to within gtol",
            LmStatus::MachinePrecision => "no further reduction in the sum of squares is possible",
            LmStatus::IterationLimit => "number of iterations exceeded the cap",
            LmStatus::TimeLimit => "wall-clock limit exceeded",
            LmStatus::EvaluationFailed => "model could not be evaluated during the fit",
            LmStatus::NumericalFailure => "solver produced a non-finite intermediate value",
        }
    }
}
