//! Read/write curve JSON files.
//!
//! A curve file holds one force-extension trace plus the fit window, so a
//! simulated curve can be saved and fitted again later with `pfit fit`.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::SyntheticCurve;
use crate::domain::{ModelKind, PolymerParams};
use crate::error::AppError;

/// On-disk curve: extension (m), force (N) and the window `[start, stop)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    /// Model the curve was generated from, when known.
    #[serde(default)]
    pub model: Option<ModelKind>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub start: usize,
    pub stop: usize,
    #[serde(default)]
    pub truth: Option<PolymerParams>,
}

impl CurveFile {
    pub fn from_synthetic(curve: &SyntheticCurve) -> Self {
        Self {
            tool: "pfit".to_string(),
            model: Some(curve.truth.kind()),
            x: curve.x.clone(),
            y: curve.y.clone(),
            start: curve.start,
            stop: curve.stop,
            truth: Some(curve.truth),
        }
    }
}

/// Write a curve JSON file.
pub fn write_curve_json(path: &Path, curve: &CurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    if curve.x.len() != curve.y.len() {
        return Err(AppError::new(
            2,
            format!("Curve JSON has {} extensions but {} forces.", curve.x.len(), curve.y.len()),
        ));
    }
    Ok(curve)
}
