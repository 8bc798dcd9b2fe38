//! Shared fit pipeline used by every subcommand.
//!
//! generate (or load) -> fit -> residuals -> recovery
//!
//! The handlers in `app` only decide what to print and export.

use crate::data::{CurveSpec, SyntheticCurve, generate_batch, generate_curve};
use crate::domain::{FitDiagnostics, PolymerFit, PolymerParams};
use crate::error::AppError;
use crate::fit::{FitJob, PolymerFitter, fit_batch};
use crate::io::CurveFile;
use crate::report::{BatchSummary, PointResidual, compute_residuals, summarize_batch};

/// Outputs of fitting a single curve.
#[derive(Debug, Clone)]
pub struct CurveRun {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub fit: PolymerFit,
    pub residuals: Vec<PointResidual>,
    /// Record published by the fit worker, if it was still unclaimed at join.
    pub published: Option<FitDiagnostics>,
    pub truth: Option<PolymerParams>,
}

/// Outputs of a batch run.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub truth: PolymerParams,
    pub results: Vec<Result<PolymerFit, crate::error::FitError>>,
    pub summary: BatchSummary,
}

/// Simulate one curve and fit it.
pub fn run_simulation(spec: &CurveSpec, fitter: &PolymerFitter) -> Result<(SyntheticCurve, CurveRun), AppError> {
    let curve = generate_curve(spec, fitter.settings())?;
    let run = fit_curve(
        curve.x.clone(),
        curve.y.clone(),
        curve.start,
        curve.stop,
        Some(curve.truth),
        fitter,
    )?;
    Ok((curve, run))
}

/// Fit a curve loaded from disk.
pub fn run_curve_file(curve: &CurveFile, fitter: &PolymerFitter) -> Result<CurveRun, AppError> {
    // A recorded truth is only meaningful for the model that produced it.
    let truth = curve.truth.filter(|t| t.kind() == fitter.kind());
    fit_curve(curve.x.clone(), curve.y.clone(), curve.start, curve.stop, truth, fitter)
}

/// Simulate `count` curves from one truth, fit them in parallel, summarize recovery.
pub fn run_batch(spec: &CurveSpec, fitter: &PolymerFitter, count: usize) -> Result<BatchRun, AppError> {
    if count == 0 {
        return Err(AppError::new(2, "Batch count must be >= 1."));
    }
    let curves = generate_batch(spec, fitter.settings(), count)?;
    let truth = curves[0].truth;
    let jobs: Vec<FitJob> = curves
        .into_iter()
        .map(|c| FitJob {
            x: c.x,
            y: c.y,
            start: c.start,
            stop: c.stop,
        })
        .collect();

    let results = fit_batch(fitter, &jobs);
    for (i, r) in results.iter().enumerate() {
        if let Err(e) = r {
            log::warn!("batch curve {i} (seed {}): {e}", spec.seed.wrapping_add(i as u64));
        }
    }
    let summary = summarize_batch(&results, &truth);
    Ok(BatchRun {
        truth,
        results,
        summary,
    })
}

fn fit_curve(
    x: Vec<f64>,
    y: Vec<f64>,
    start: usize,
    stop: usize,
    truth: Option<PolymerParams>,
    fitter: &PolymerFitter,
) -> Result<CurveRun, AppError> {
    let worker = fitter.spawn(x.clone(), y.clone(), start, stop);
    let (result, receiver) = worker.join();
    let fit = result?;
    let published = receiver.try_take();
    if published.is_none() {
        log::warn!("fit succeeded but no diagnostics record was published");
    }

    let residuals = compute_residuals(&x, &y, &fit, start, stop)?;
    Ok(CurveRun {
        x,
        y,
        fit,
        residuals,
        published,
        truth,
    })
}
