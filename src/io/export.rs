//! Export fit results to JSON and residuals to CSV.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{PolymerFit, PolymerParams, PolymerSettings};
use crate::error::AppError;
use crate::report::PointResidual;

/// Everything needed to reproduce or audit a single fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitExport<'a> {
    pub tool: &'static str,
    pub settings: &'a PolymerSettings,
    pub fit: &'a PolymerFit,
    pub truth: Option<&'a PolymerParams>,
}

/// Write a fit (parameters, tension, diagnostics) to pretty JSON.
pub fn write_fit_json(path: &Path, export: &FitExport<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, export)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON: {e}")))?;
    Ok(())
}

/// Write per-point residuals to a CSV file (SI units).
pub fn write_residuals_csv(path: &Path, residuals: &[PointResidual]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "index,x_m,force_obs_n,force_fit_n,residual_n")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        writeln!(
            file,
            "{},{:.6e},{:.6e},{:.6e},{:.6e}",
            r.index, r.x, r.y_obs, r.y_fit, r.residual
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}
