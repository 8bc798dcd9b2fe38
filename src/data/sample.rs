//! Synthetic force-extension curves.
//!
//! A curve has two parts:
//!
//! - a contact/baseline region of `baseline_points` samples at extensions below
//!   `x_min`, where the chain is slack and the force is pure noise
//! - the stretched region of `points` samples spanning `[x_min, x_max]`, where
//!   the force follows the chosen polymer model plus Gaussian noise
//!
//! The stretched region is the fit window `[start, stop)`.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{ModelKind, PolymerParams, PolymerSettings};
use crate::error::AppError;
use crate::models::{PegChain, fjc_fn, fjc_peg_fn, wlc_fn};

/// How to draw a synthetic curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSpec {
    pub model: ModelKind,
    /// Contour length (m) for WLC/FJC, segment count for FJC-PEG.
    pub primary: f64,
    /// Persistence (WLC) or Kuhn (FJC, FJC-PEG) length, m.
    pub secondary: f64,
    pub x_min: f64,
    pub x_max: f64,
    pub points: usize,
    pub baseline_points: usize,
    /// Force noise standard deviation, N.
    pub noise_sigma: f64,
    pub seed: u64,
}

/// A generated curve with its ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticCurve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Noise-free force.
    pub clean: Vec<f64>,
    pub start: usize,
    pub stop: usize,
    pub truth: PolymerParams,
}

pub fn generate_curve(spec: &CurveSpec, settings: &PolymerSettings) -> Result<SyntheticCurve, AppError> {
    validate(spec)?;

    let truth = truth_params(spec);
    let stretched: Vec<f64> = (0..spec.points)
        .map(|i| spec.x_min + (spec.x_max - spec.x_min) * i as f64 / (spec.points - 1) as f64)
        .collect();
    let force = model_force(&stretched, &truth, settings)?;
    if force.iter().any(|f| !f.is_finite()) {
        return Err(AppError::new(
            2,
            format!("{} force is not finite over [{:e}, {:e}] m.", spec.model, spec.x_min, spec.x_max),
        ));
    }

    // Slack region: evenly spaced in [0, x_min).
    let mut x: Vec<f64> = (0..spec.baseline_points)
        .map(|i| spec.x_min * i as f64 / spec.baseline_points as f64)
        .collect();
    let mut clean = vec![0.0; spec.baseline_points];
    x.extend_from_slice(&stretched);
    clean.extend_from_slice(&force);

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let y: Vec<f64> = clean
        .iter()
        .map(|&f| f + spec.noise_sigma * normal.sample(&mut rng))
        .collect();

    log::debug!(
        "generated {} curve: {} points, window [{}, {}), seed {}",
        spec.model,
        x.len(),
        spec.baseline_points,
        spec.baseline_points + spec.points,
        spec.seed
    );

    Ok(SyntheticCurve {
        x,
        y,
        clean,
        start: spec.baseline_points,
        stop: spec.baseline_points + spec.points,
        truth,
    })
}

/// `count` curves from `spec`, seeds `spec.seed, spec.seed + 1, ...`.
pub fn generate_batch(
    spec: &CurveSpec,
    settings: &PolymerSettings,
    count: usize,
) -> Result<Vec<SyntheticCurve>, AppError> {
    (0..count as u64)
        .map(|i| {
            let spec = CurveSpec {
                seed: spec.seed.wrapping_add(i),
                ..*spec
            };
            generate_curve(&spec, settings)
        })
        .collect()
}

fn validate(spec: &CurveSpec) -> Result<(), AppError> {
    if spec.points < 2 {
        return Err(AppError::new(2, "A synthetic curve needs at least 2 stretched points."));
    }
    if !(spec.x_min.is_finite() && spec.x_max.is_finite() && spec.x_min > 0.0 && spec.x_max > spec.x_min) {
        return Err(AppError::new(2, "Invalid extension range: need 0 < x_min < x_max."));
    }
    if !(spec.noise_sigma.is_finite() && spec.noise_sigma >= 0.0) {
        return Err(AppError::new(2, "Noise sigma must be finite and >= 0."));
    }
    if !(spec.primary.is_finite() && spec.primary > 0.0 && spec.secondary.is_finite() && spec.secondary > 0.0) {
        return Err(AppError::new(2, "Chain parameters must be finite and > 0."));
    }
    if matches!(spec.model, ModelKind::Wlc | ModelKind::Fjc) && spec.x_max >= spec.primary {
        return Err(AppError::new(
            2,
            format!(
                "x_max ({:e} m) must be below the contour length ({:e} m).",
                spec.x_max, spec.primary
            ),
        ));
    }
    Ok(())
}

fn truth_params(spec: &CurveSpec) -> PolymerParams {
    match spec.model {
        ModelKind::Wlc => PolymerParams::Wlc {
            contour_length: spec.primary,
            persistence_length: spec.secondary,
        },
        ModelKind::Fjc => PolymerParams::Fjc {
            contour_length: spec.primary,
            kuhn_length: spec.secondary,
        },
        ModelKind::FjcPeg => PolymerParams::FjcPeg {
            segment_count: spec.primary,
            kuhn_length: spec.secondary,
        },
    }
}

/// Noise-free force of `params` at `x`, using the temperature and PEG
/// properties in `settings`.
pub fn model_force(x: &[f64], params: &PolymerParams, settings: &PolymerSettings) -> Result<Vec<f64>, AppError> {
    let t = settings.temperature;
    let force = match *params {
        PolymerParams::Wlc {
            contour_length,
            persistence_length,
        } => Ok(wlc_fn(x, t, contour_length, persistence_length)),
        PolymerParams::Fjc {
            contour_length,
            kuhn_length,
        } => fjc_fn(x, t, contour_length, kuhn_length),
        PolymerParams::FjcPeg {
            segment_count,
            kuhn_length,
        } => fjc_peg_fn(
            x,
            &PegChain {
                temperature: t,
                segment_count,
                elasticity: settings.peg.elasticity,
                planar_length: settings.peg.planar_length,
                helical_length: settings.peg.helical_length,
                delta_g: settings.peg.delta_g,
                kuhn_length,
            },
        ),
    };
    force.map_err(|e| AppError::new(4, format!("{} model evaluation failed: {e}", params.kind())))
}
