//! Error types.
//!
//! - `ConvergenceError`: scalar root-finding failures (Newton / secant)
//! - `FitError`: everything the fitting core can report to its caller
//! - `AppError`: what the `pfit` binary prints before exiting with a code

use thiserror::Error;

/// Failure of a scalar root solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConvergenceError {
    #[error("root solve did not converge within the iteration cap")]
    Iterations,

    #[error("root solve produced a non-finite value")]
    NonFinite,

    #[error("root solve hit a zero derivative before converging")]
    ZeroDerivative,
}

/// Failure of a polymer fit.
///
/// All variants are recoverable: the core never retries, so a caller that wants
/// to perturb the seed and try again is free to do so.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The minimizer did not converge, or converged to a non-physical value.
    #[error("poor fit: {0}")]
    PoorFit(String),

    #[error("under-determined fit: {points} data points for {params} free parameters")]
    UnderDetermined { points: usize, params: usize },

    #[error("unknown polymer model '{0}' (expected WLC, FJC or FJC-PEG)")]
    UnknownModel(String),

    #[error("invalid fit window [{start}, {stop}) for {len} data points")]
    InvalidWindow { start: usize, stop: usize, len: usize },

    #[error("x and y data lengths differ: {x} vs {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The thread running the fit panicked; carries the panic message.
    #[error("fit worker panicked: {0}")]
    WorkerPanicked(String),

    /// A diagnostics record was published while the previous one was still uncollected.
    #[error("previous fit diagnostics have not been collected")]
    DiagnosticsPending,
}

impl From<ConvergenceError> for FitError {
    fn from(value: ConvergenceError) -> Self {
        FitError::PoorFit(value.to_string())
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

impl From<FitError> for AppError {
    fn from(value: FitError) -> Self {
        let exit_code = match value {
            FitError::UnknownModel(_) | FitError::InvalidWindow { .. } => 2,
            FitError::UnderDetermined { .. } | FitError::LengthMismatch { .. } => 3,
            _ => 4,
        };
        AppError::new(exit_code, value.to_string())
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
    fn fit_errors_map_to_exit_codes() {
        let e: AppError = FitError::UnknownModel("XYZ".into()).into();
        assert_eq!(e.exit_code(), 2);
        assert!(e.to_string().contains("XYZ"));

        let e: AppError = FitError::UnderDetermined { points: 1, params: 2 }.into();
        assert_eq!(e.exit_code(), 3);

        let e: AppError = FitError::PoorFit("stalled".into()).into();
        assert_eq!(e.exit_code(), 4);

        let e: AppError = FitError::WorkerPanicked("index out of bounds".into()).into();
        assert_eq!(e.exit_code(), 4);
        assert!(e.to_string().contains("panicked"));
    }

    #[test]
    fn convergence_errors_become_poor_fits() {
        let e: FitError = ConvergenceError::Iterations.into();
        assert!(matches!(e, FitError::PoorFit(_)));
    }
}
