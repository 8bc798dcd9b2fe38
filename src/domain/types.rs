//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - passed around in-memory during fitting
//! - exported to JSON alongside the fitted tension
//! - rebuilt from the environment (`PolymerSettings::from_env`)
//!
//! All lengths are meters, forces Newtons, temperatures Kelvin.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, FitError};
use crate::math::LmStatus;

/// Polymer elasticity model selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ModelKind {
    #[serde(rename = "WLC")]
    #[value(name = "wlc")]
    Wlc,
    #[serde(rename = "FJC")]
    #[value(name = "fjc")]
    Fjc,
    #[serde(rename = "FJC-PEG")]
    #[value(name = "fjc-peg")]
    FjcPeg,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Wlc, ModelKind::Fjc, ModelKind::FjcPeg];

    /// Canonical model name, as accepted by [`FromStr`].
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Wlc => "WLC",
            ModelKind::Fjc => "FJC",
            ModelKind::FjcPeg => "FJC-PEG",
        }
    }

    /// Label of the primary fitted quantity.
    pub fn primary_name(self) -> &'static str {
        match self {
            ModelKind::Wlc | ModelKind::Fjc => "contour length",
            ModelKind::FjcPeg => "segment count",
        }
    }

    /// Label of the optional secondary length.
    pub fn secondary_name(self) -> &'static str {
        match self {
            ModelKind::Wlc => "persistence length",
            ModelKind::Fjc | ModelKind::FjcPeg => "Kuhn length",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = FitError;

    /// Accepts `WLC`, `FJC` and `FJC-PEG` (or `FJC_PEG`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WLC" => Ok(ModelKind::Wlc),
            "FJC" => Ok(ModelKind::Fjc),
            "FJC-PEG" | "FJC_PEG" => Ok(ModelKind::FjcPeg),
            _ => Err(FitError::UnknownModel(s.to_string())),
        }
    }
}

/// Fixed PEG segment properties (Oesterhelt et al.).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PegSettings {
    /// Segment elasticity, N/m.
    pub elasticity: f64,
    /// `G_planar - G_helical` in units of kB T; positive leaves a relaxed
    /// chain mostly helical.
    pub delta_g: f64,
    /// Helical (ttg) segment length, m.
    pub helical_length: f64,
    /// Planar (ttt) segment length, m.
    pub planar_length: f64,
}

impl Default for PegSettings {
    fn default() -> Self {
        Self {
            elasticity: 150.0,
            delta_g: 3.0,
            helical_length: 2.8e-10,
            planar_length: 3.58e-10,
        }
    }
}

/// Persistence and Kuhn length held fixed unless configured otherwise, m.
pub const DEFAULT_SECONDARY_LENGTH: f64 = 4e-10;

/// Physical configuration of a polymer fit.
///
/// A secondary length set to `None` is fitted; `Some(v)` holds it at `v` and
/// drops it from the free-parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolymerSettings {
    pub temperature: f64,
    pub wlc_persistence_length: Option<f64>,
    pub fjc_kuhn_length: Option<f64>,
    pub peg_kuhn_length: Option<f64>,
    pub peg: PegSettings,
    /// Expected force noise (N); enables the `quality` score in diagnostics.
    pub noise_sigma: Option<f64>,
}

impl Default for PolymerSettings {
    fn default() -> Self {
        Self {
            temperature: 300.0,
            wlc_persistence_length: Some(DEFAULT_SECONDARY_LENGTH),
            fjc_kuhn_length: Some(DEFAULT_SECONDARY_LENGTH),
            peg_kuhn_length: Some(DEFAULT_SECONDARY_LENGTH),
            peg: PegSettings::default(),
            noise_sigma: None,
        }
    }
}

impl PolymerSettings {
    /// Defaults overridden by `PFIT_*` variables (a `.env` file is honored).
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `PFIT_*` key.
    ///
    /// Length keys accept `free` to release the parameter.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut s = Self::default();

        if let Some(v) = read_f64(&lookup, "PFIT_TEMPERATURE")? {
            s.temperature = v;
        }
        if let Some(v) = read_length(&lookup, "PFIT_WLC_PERSISTENCE_LENGTH")? {
            s.wlc_persistence_length = v;
        }
        if let Some(v) = read_length(&lookup, "PFIT_FJC_KUHN_LENGTH")? {
            s.fjc_kuhn_length = v;
        }
        if let Some(v) = read_length(&lookup, "PFIT_PEG_KUHN_LENGTH")? {
            s.peg_kuhn_length = v;
        }
        if let Some(v) = read_f64(&lookup, "PFIT_PEG_ELASTICITY")? {
            s.peg.elasticity = v;
        }
        if let Some(v) = read_f64(&lookup, "PFIT_PEG_DELTA_G")? {
            s.peg.delta_g = v;
        }
        if let Some(v) = read_f64(&lookup, "PFIT_PEG_HELICAL_LENGTH")? {
            s.peg.helical_length = v;
        }
        if let Some(v) = read_f64(&lookup, "PFIT_PEG_PLANAR_LENGTH")? {
            s.peg.planar_length = v;
        }
        if let Some(v) = read_f64(&lookup, "PFIT_NOISE_SIGMA")? {
            s.noise_sigma = Some(v);
        }

        s.validate()?;
        Ok(s)
    }

    /// Reject values no model can use.
    pub fn validate(&self) -> Result<(), AppError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(AppError::new(2, format!("{name} must be finite and > 0 (got {v}).")))
            }
        };

        positive("temperature", self.temperature)?;
        for (name, v) in [
            ("WLC persistence length", self.wlc_persistence_length),
            ("FJC Kuhn length", self.fjc_kuhn_length),
            ("FJC-PEG Kuhn length", self.peg_kuhn_length),
            ("noise sigma", self.noise_sigma),
        ] {
            if let Some(v) = v {
                positive(name, v)?;
            }
        }
        positive("PEG elasticity", self.peg.elasticity)?;
        positive("PEG helical length", self.peg.helical_length)?;
        positive("PEG planar length", self.peg.planar_length)?;
        if !self.peg.delta_g.is_finite() {
            return Err(AppError::new(2, "PEG delta G must be finite."));
        }
        Ok(())
    }

    /// The fixed secondary length for `kind`, if any.
    pub fn secondary_length(&self, kind: ModelKind) -> Option<f64> {
        match kind {
            ModelKind::Wlc => self.wlc_persistence_length,
            ModelKind::Fjc => self.fjc_kuhn_length,
            ModelKind::FjcPeg => self.peg_kuhn_length,
        }
    }

    /// Copy with the secondary length of `kind` replaced.
    pub fn with_secondary_length(mut self, kind: ModelKind, value: Option<f64>) -> Self {
        match kind {
            ModelKind::Wlc => self.wlc_persistence_length = value,
            ModelKind::Fjc => self.fjc_kuhn_length = value,
            ModelKind::FjcPeg => self.peg_kuhn_length = value,
        }
        self
    }
}

fn read_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<f64>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| AppError::new(2, format!("Invalid {key}: '{raw}' is not a number.")))
}

/// `Some(None)` means the key was set to `free`.
fn read_length(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Option<f64>>, AppError> {
    match lookup(key) {
        Some(raw) if raw.trim().eq_ignore_ascii_case("free") => Ok(Some(None)),
        Some(_) => Ok(read_f64(lookup, key)?.map(Some)),
        None => Ok(None),
    }
}

/// Recovered physical parameters of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum PolymerParams {
    #[serde(rename = "WLC")]
    Wlc {
        contour_length: f64,
        persistence_length: f64,
    },
    #[serde(rename = "FJC")]
    Fjc { contour_length: f64, kuhn_length: f64 },
    #[serde(rename = "FJC-PEG")]
    FjcPeg { segment_count: f64, kuhn_length: f64 },
}

impl PolymerParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            PolymerParams::Wlc { .. } => ModelKind::Wlc,
            PolymerParams::Fjc { .. } => ModelKind::Fjc,
            PolymerParams::FjcPeg { .. } => ModelKind::FjcPeg,
        }
    }

    /// Contour length (m) or segment count.
    pub fn primary(&self) -> f64 {
        match *self {
            PolymerParams::Wlc { contour_length, .. } | PolymerParams::Fjc { contour_length, .. } => {
                contour_length
            }
            PolymerParams::FjcPeg { segment_count, .. } => segment_count,
        }
    }

    /// Persistence or Kuhn length (m).
    pub fn secondary(&self) -> f64 {
        match *self {
            PolymerParams::Wlc {
                persistence_length, ..
            } => persistence_length,
            PolymerParams::Fjc { kuhn_length, .. } | PolymerParams::FjcPeg { kuhn_length, .. } => {
                kuhn_length
            }
        }
    }
}

/// Why the minimizer stopped.
pub type ConvergenceStatus = LmStatus;

/// Everything the generic fitter knows about one fit.
///
/// Parameter vectors are in reparametrized (optimizer) units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub rescaled: bool,
    pub initial_params: Vec<f64>,
    pub scale: Vec<f64>,
    pub data_scale_factor: f64,
    /// Optimizer-space solution (`fit_params / initial_params` when rescaled).
    pub active_params: Vec<f64>,
    pub fit_params: Vec<f64>,
    /// Residual-variance scaled covariance, row-major; `None` when singular
    /// or when there are no spare degrees of freedom.
    pub covariance: Option<Vec<Vec<f64>>>,
    pub standard_errors: Option<Vec<f64>>,
    pub status: ConvergenceStatus,
    /// Jacobians the minimizer asked for.
    pub iterations: usize,
    /// Model evaluations, difference steps included.
    pub evaluations: usize,
    /// Sum of squared residuals in data units.
    pub sse: f64,
    pub rmse: f64,
    /// `rmse / noise_sigma`; about one or below for a good fit.
    pub quality: Option<f64>,
}

/// Result of the generic fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    /// Fitted free parameters in reparametrized units.
    pub params: Vec<f64>,
    pub diagnostics: FitDiagnostics,
}

/// Result of a polymer fit over a full data segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymerFit {
    pub model: ModelKind,
    /// Same length as the input; zero outside the fit window.
    pub tension: Vec<f64>,
    pub params: PolymerParams,
    pub diagnostics: FitDiagnostics,
}
