//! Reporting utilities: residuals, parameter recovery and batch statistics.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::domain::{PolymerFit, PolymerParams};
use crate::error::{AppError, FitError};

/// Observed vs fitted force at one sample inside the fit window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointResidual {
    pub index: usize,
    pub x: f64,
    pub y_obs: f64,
    pub y_fit: f64,
    pub residual: f64,
}

/// Residuals over `[start, stop)`.
pub fn compute_residuals(
    x: &[f64],
    y: &[f64],
    fit: &PolymerFit,
    start: usize,
    stop: usize,
) -> Result<Vec<PointResidual>, AppError> {
    if stop > x.len() || stop > y.len() || stop > fit.tension.len() || start > stop {
        return Err(AppError::new(4, "Residual window does not match the fitted data."));
    }
    let mut out = Vec::with_capacity(stop - start);
    for i in start..stop {
        let y_fit = fit.tension[i];
        if !y_fit.is_finite() {
            return Err(AppError::new(4, "Non-finite model prediction during residual computation."));
        }
        out.push(PointResidual {
            index: i,
            x: x[i],
            y_obs: y[i],
            y_fit,
            residual: y[i] - y_fit,
        });
    }
    Ok(out)
}

/// The `top_n` residuals of largest magnitude, largest first.
pub fn largest_residuals(residuals: &[PointResidual], top_n: usize) -> Vec<PointResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));
    sorted.truncate(top_n);
    sorted
}

/// Relative errors of fitted parameters against a known truth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recovery {
    pub primary: f64,
    pub secondary: f64,
}

pub fn recovery(fitted: &PolymerParams, truth: &PolymerParams) -> Recovery {
    Recovery {
        primary: (fitted.primary() - truth.primary()) / truth.primary(),
        secondary: (fitted.secondary() - truth.secondary()) / truth.secondary(),
    }
}

/// Aggregate recovery over many fits of curves drawn from one truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub fits: usize,
    pub failures: usize,
    pub primary_mean: f64,
    pub primary_std: f64,
    pub secondary_mean: f64,
    pub secondary_std: f64,
    /// Mean RMSE of the successful fits, N.
    pub mean_rmse: f64,
}

pub fn summarize_batch(results: &[Result<PolymerFit, FitError>], truth: &PolymerParams) -> BatchSummary {
    let ok: Vec<&PolymerFit> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let rec: Vec<Recovery> = ok.iter().map(|f| recovery(&f.params, truth)).collect();
    let (primary_mean, primary_std) = mean_std(rec.iter().map(|r| r.primary));
    let (secondary_mean, secondary_std) = mean_std(rec.iter().map(|r| r.secondary));
    let (mean_rmse, _) = mean_std(ok.iter().map(|f| f.diagnostics.rmse));

    BatchSummary {
        fits: results.len(),
        failures: results.len() - ok.len(),
        primary_mean,
        primary_std,
        secondary_mean,
        secondary_std,
        mean_rmse,
    }
}

/// Population mean and standard deviation; `NaN` for no values.
fn mean_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let v: Vec<f64> = values.collect();
    if v.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = v.len() as f64;
    let mean = v.iter().sum::<f64>() / n;
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
