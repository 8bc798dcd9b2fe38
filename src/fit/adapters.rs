//! Per-model fit adapters: WLC and FJC ([`ContourFit`]) and FJC-PEG
//! ([`FjcPegFit`]) behind [`FitModel`].
//!
//! Each adapter binds the temperature, the fixed parameters and the x window,
//! and supplies:
//!
//! - `guess_initial_params`: contour length `1.5 x_max` (WLC/FJC) or the segment
//!   count that stretches to `x_max` at the largest force (FJC-PEG); a free
//!   secondary length starts at `x_max / 10`
//! - `guess_scale`: `1.0` for the reparametrized primary, `guess / 10` for a
//!   free secondary
//! - `model`: undo the reparametrization, take `|secondary|`, evaluate the
//!   model function over the window
//!
//! Whether the secondary length is fitted is settled at construction
//! ([`Secondary`]) and the free vector is decoded into [`FreeParams`].

use crate::domain::{PegSettings, PolymerParams};
use crate::error::{ConvergenceError, FitError};
use crate::fit::fitter::FitModel;
use crate::fit::reparam::Reparam;
use crate::models::{PegChain, fjc_fn, fjc_peg_fn, inverse_fjc_peg_force, wlc_fn};

/// Persistence or Kuhn length: held fixed or fitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Secondary {
    Fixed(f64),
    Free,
}

impl Secondary {
    /// `None` in the settings means free.
    pub fn from_setting(value: Option<f64>) -> Self {
        match value {
            Some(v) => Secondary::Fixed(v),
            None => Secondary::Free,
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, Secondary::Free)
    }

    fn param_count(self) -> usize {
        if self.is_free() { 2 } else { 1 }
    }
}

/// Decoded free-parameter vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreeParams {
    /// Reparametrized primary only.
    OneParam(f64),
    /// Reparametrized primary and the raw secondary length.
    TwoParam(f64, f64),
}

impl FreeParams {
    /// Missing entries decode as `NaN` and surface as non-finite predictions.
    pub fn decode(params: &[f64], secondary: Secondary) -> Self {
        let primary = params.first().copied().unwrap_or(f64::NAN);
        match secondary {
            Secondary::Fixed(_) => FreeParams::OneParam(primary),
            Secondary::Free => FreeParams::TwoParam(primary, params.get(1).copied().unwrap_or(f64::NAN)),
        }
    }

    pub fn to_vec(self) -> Vec<f64> {
        match self {
            FreeParams::OneParam(u) => vec![u],
            FreeParams::TwoParam(u, s) => vec![u, s],
        }
    }

    pub fn primary(self) -> f64 {
        match self {
            FreeParams::OneParam(u) | FreeParams::TwoParam(u, _) => u,
        }
    }

    /// Physical secondary length; a fitted one is taken by magnitude.
    pub fn secondary_length(self, secondary: Secondary) -> f64 {
        match (self, secondary) {
            (FreeParams::TwoParam(_, s), _) => s.abs(),
            (FreeParams::OneParam(_), Secondary::Fixed(v)) => v,
            (FreeParams::OneParam(_), Secondary::Free) => f64::NAN,
        }
    }
}

/// A [`FitModel`] that can also report physical parameters.
pub trait PolymerAdapter: FitModel + Send + Sync {
    /// Physical parameters for a fitted free vector.
    ///
    /// # Errors
    /// [`FitError::PoorFit`] if any reconstructed value is not finite.
    fn physical_params(&self, params: &[f64]) -> Result<PolymerParams, FitError>;
}

/// Window, fixed settings and primary reparametrization shared by all adapters.
#[derive(Debug, Clone, Copy)]
struct Window<'a> {
    x: &'a [f64],
    x_max: f64,
    temperature: f64,
    secondary: Secondary,
    reparam: Reparam,
}

impl<'a> Window<'a> {
    fn new(
        x: &'a [f64],
        temperature: f64,
        secondary: Secondary,
        reparam: impl FnOnce(f64) -> Reparam,
    ) -> Result<Self, FitError> {
        let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if x.iter().any(|v| !v.is_finite()) || !(x_max > 0.0) {
            return Err(FitError::InvalidInput(
                "x window must be finite with a positive maximum".into(),
            ));
        }
        Ok(Self {
            x,
            x_max,
            temperature,
            secondary,
            reparam: reparam(x_max),
        })
    }

    fn param_count(&self) -> usize {
        self.secondary.param_count()
    }

    fn initial_secondary(&self) -> f64 {
        match self.secondary {
            Secondary::Fixed(v) => v,
            Secondary::Free => self.x_max / 10.0,
        }
    }

    /// Free vector for a physical primary value and the initial secondary.
    fn initial_params(&self, primary: f64) -> Vec<f64> {
        let u = self.reparam.forward(primary);
        match self.secondary {
            Secondary::Fixed(_) => FreeParams::OneParam(u),
            Secondary::Free => FreeParams::TwoParam(u, self.initial_secondary()),
        }
        .to_vec()
    }

    /// Physical `(primary, secondary)` for a free vector.
    fn physical(&self, params: &[f64]) -> (f64, f64) {
        let free = FreeParams::decode(params, self.secondary);
        (
            self.reparam.inverse(free.primary()),
            free.secondary_length(self.secondary),
        )
    }
}

fn scale_for(params: &[f64]) -> Vec<f64> {
    std::iter::once(1.0)
        .chain(params.iter().skip(1).map(|v| v.abs() / 10.0))
        .collect()
}

fn check_finite(params: PolymerParams) -> Result<PolymerParams, FitError> {
    if params.primary().is_finite() && params.secondary().is_finite() {
        Ok(params)
    } else {
        Err(FitError::PoorFit(format!("non-physical fit result {params:?}")))
    }
}

/// Chain models parametrized by a contour length and one secondary length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourModel {
    /// Worm-like chain; the secondary is the persistence length.
    Wlc,
    /// Freely-jointed chain; the secondary is the Kuhn length.
    Fjc,
}

impl ContourModel {
    fn force(self, x: &[f64], temperature: f64, contour: f64, secondary: f64) -> Result<Vec<f64>, ConvergenceError> {
        match self {
            ContourModel::Wlc => Ok(wlc_fn(x, temperature, contour, secondary)),
            ContourModel::Fjc => fjc_fn(x, temperature, contour, secondary),
        }
    }

    fn params(self, contour_length: f64, secondary: f64) -> PolymerParams {
        match self {
            ContourModel::Wlc => PolymerParams::Wlc {
                contour_length,
                persistence_length: secondary,
            },
            ContourModel::Fjc => PolymerParams::Fjc {
                contour_length,
                kuhn_length: secondary,
            },
        }
    }
}

/// WLC or FJC: contour length `L` (kept above `x_max`) and a secondary length.
#[derive(Debug, Clone, Copy)]
pub struct ContourFit<'a> {
    window: Window<'a>,
    chain: ContourModel,
}

impl<'a> ContourFit<'a> {
    pub fn new(chain: ContourModel, x: &'a [f64], temperature: f64, secondary: Secondary) -> Result<Self, FitError> {
        let window = Window::new(x, temperature, secondary, |x_max| Reparam::AboveDataMax { x_max })?;
        Ok(Self { window, chain })
    }

    /// Worm-like chain with persistence length `persistence_length`.
    pub fn wlc(x: &'a [f64], temperature: f64, persistence_length: Secondary) -> Result<Self, FitError> {
        Self::new(ContourModel::Wlc, x, temperature, persistence_length)
    }

    /// Freely-jointed chain with Kuhn length `kuhn_length`.
    pub fn fjc(x: &'a [f64], temperature: f64, kuhn_length: Secondary) -> Result<Self, FitError> {
        Self::new(ContourModel::Fjc, x, temperature, kuhn_length)
    }
}

impl FitModel for ContourFit<'_> {
    fn param_count(&self) -> usize {
        self.window.param_count()
    }

    fn guess_initial_params(&self, _data: &[f64]) -> Result<Vec<f64>, FitError> {
        Ok(self.window.initial_params(1.5 * self.window.x_max))
    }

    fn guess_scale(&self, params: &[f64]) -> Vec<f64> {
        scale_for(params)
    }

    fn model(&self, params: &[f64]) -> Result<Vec<f64>, ConvergenceError> {
        let (contour, secondary) = self.window.physical(params);
        self.chain
            .force(self.window.x, self.window.temperature, contour, secondary)
    }
}

impl PolymerAdapter for ContourFit<'_> {
    fn physical_params(&self, params: &[f64]) -> Result<PolymerParams, FitError> {
        let (contour_length, secondary) = self.window.physical(params);
        check_finite(self.chain.params(contour_length, secondary))
    }
}

/// PEG-adjusted extended FJC: segment count `N` (positive) and Kuhn length `a`.
#[derive(Debug, Clone, Copy)]
pub struct FjcPegFit<'a> {
    window: Window<'a>,
    peg: PegSettings,
}

impl<'a> FjcPegFit<'a> {
    pub fn new(
        x: &'a [f64],
        temperature: f64,
        kuhn_length: Secondary,
        peg: PegSettings,
    ) -> Result<Self, FitError> {
        let window = Window::new(x, temperature, kuhn_length, |x_max| Reparam::Positive { x_max })?;
        Ok(Self { window, peg })
    }

    fn chain(&self, segment_count: f64, kuhn_length: f64) -> PegChain {
        PegChain {
            temperature: self.window.temperature,
            segment_count,
            elasticity: self.peg.elasticity,
            planar_length: self.peg.planar_length,
            helical_length: self.peg.helical_length,
            delta_g: self.peg.delta_g,
            kuhn_length,
        }
    }
}

impl FitModel for FjcPegFit<'_> {
    fn param_count(&self) -> usize {
        self.window.param_count()
    }

    /// `N = x_max / x(F_max)` for a single segment at the largest observed force.
    fn guess_initial_params(&self, data: &[f64]) -> Result<Vec<f64>, FitError> {
        let f_max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(f_max.is_finite() && f_max > 0.0) {
            return Err(FitError::InvalidInput(
                "FJC-PEG needs a positive maximum force to guess the segment count".into(),
            ));
        }
        let x_segment = inverse_fjc_peg_force(f_max, &self.chain(1.0, self.window.initial_secondary()));
        let segment_count = self.window.x_max / x_segment;
        log::debug!("FJC-PEG seed: {x_segment:e} m per segment at {f_max:e} N, N = {segment_count}");

        Ok(self.window.initial_params(segment_count))
    }

    fn guess_scale(&self, params: &[f64]) -> Vec<f64> {
        scale_for(params)
    }

    fn model(&self, params: &[f64]) -> Result<Vec<f64>, ConvergenceError> {
        let (n, a) = self.window.physical(params);
        fjc_peg_fn(self.window.x, &self.chain(n, a))
    }
}

impl PolymerAdapter for FjcPegFit<'_> {
    fn physical_params(&self, params: &[f64]) -> Result<PolymerParams, FitError> {
        let (segment_count, kuhn_length) = self.window.physical(params);
        check_finite(PolymerParams::FjcPeg {
            segment_count,
            kuhn_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fitter::ModelFitter;

    const T: f64 = 300.0;

    fn x_data() -> Vec<f64> {
        (0..20).map(|i| 10e-9 + 20e-9 * i as f64 / 19.0).collect()
    }

    fn rel(got: f64, want: f64) -> f64 {
        ((got - want) / want).abs()
    }

    #[test]
    fn free_params_decode_by_secondary() {
        assert_eq!(FreeParams::decode(&[0.5], Secondary::Fixed(1e-9)), FreeParams::OneParam(0.5));
        assert_eq!(
            FreeParams::decode(&[0.5, -2e-10], Secondary::Free),
            FreeParams::TwoParam(0.5, -2e-10)
        );
        assert_eq!(FreeParams::TwoParam(0.5, -2e-10).secondary_length(Secondary::Free), 2e-10);
        assert_eq!(FreeParams::OneParam(0.5).secondary_length(Secondary::Fixed(1e-9)), 1e-9);
        assert!(FreeParams::decode(&[], Secondary::Free).primary().is_nan());
    }

    #[test]
    fn initial_guesses_follow_data_extent() {
        let x = x_data();
        let wlc = ContourFit::wlc(&x, T, Secondary::Free).unwrap();
        let p0 = wlc.guess_initial_params(&[]).unwrap();
        assert!((p0[0] - 0.5_f64.ln()).abs() < 1e-12);
        assert!((p0[1] - 3e-9).abs() < 1e-21);
        let s = wlc.guess_scale(&p0);
        assert_eq!(s[0], 1.0);
        assert!((s[1] - 3e-10).abs() < 1e-22);

        let fjc = ContourFit::fjc(&x, T, Secondary::Fixed(4e-10)).unwrap();
        assert_eq!(fjc.param_count(), 1);
        assert_eq!(fjc.guess_initial_params(&[]).unwrap().len(), 1);
    }

    #[test]
    fn peg_guess_inverts_single_segment() {
        let x = x_data();
        let fit = FjcPegFit::new(&x, T, Secondary::Fixed(7e-10), PegSettings::default()).unwrap();
        let f_max = 2e-11;
        let p0 = fit.guess_initial_params(&[1e-12, f_max]).unwrap();
        let n = Reparam::Positive { x_max: 30e-9 }.inverse(p0[0]);
        let x_seg = inverse_fjc_peg_force(f_max, &fit.chain(1.0, 7e-10));
        assert!(rel(n * x_seg, 30e-9) < 1e-12, "N = {n}");

        let err = fit.guess_initial_params(&[0.0, -1e-12]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }

    #[test]
    fn window_must_reach_positive_extension() {
        let err = ContourFit::wlc(&[0.0, -1e-9], T, Secondary::Free).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
        assert!(ContourFit::fjc(&[], T, Secondary::Free).is_err());
    }

    #[test]
    fn fjc_recovers_contour_and_kuhn_length() {
        let x = x_data();
        let d = fjc_fn(&x, T, 35e-9, 2.5e-10).unwrap();
        let model = ContourFit::fjc(&x, T, Secondary::Free).unwrap();
        let outcome = ModelFitter::new(&d, true).fit(&model).unwrap();

        let PolymerParams::Fjc {
            contour_length,
            kuhn_length,
        } = model.physical_params(&outcome.params).unwrap()
        else {
            panic!("wrong parameter family");
        };
        assert!(rel(contour_length, 35e-9) < 0.01, "L = {contour_length:e}");
        assert!(rel(kuhn_length, 2.5e-10) < 0.01, "a = {kuhn_length:e}");
    }

    #[test]
    fn wlc_recovers_contour_and_persistence_length() {
        let x = x_data();
        let d = wlc_fn(&x, T, 35e-9, 2.5e-10);
        let model = ContourFit::wlc(&x, T, Secondary::Free).unwrap();
        let outcome = ModelFitter::new(&d, true).fit(&model).unwrap();
        let params = model.physical_params(&outcome.params).unwrap();

        assert!(rel(params.primary(), 35e-9) < 0.01, "L = {:e}", params.primary());
        assert!(rel(params.secondary(), 2.5e-10) < 0.01, "p = {:e}", params.secondary());
    }

    #[test]
    fn wlc_with_wrong_fixed_persistence_length_deviates_more() {
        let x = x_data();
        let d = wlc_fn(&x, T, 35e-9, 2.5e-10);

        let free = ContourFit::wlc(&x, T, Secondary::Free).unwrap();
        let l_free = free
            .physical_params(&ModelFitter::new(&d, true).fit(&free).unwrap().params)
            .unwrap()
            .primary();

        let fixed = ContourFit::wlc(&x, T, Secondary::Fixed(5e-10)).unwrap();
        let outcome = ModelFitter::new(&d, true).fit(&fixed).unwrap();
        assert_eq!(outcome.params.len(), 1);
        let l_fixed = fixed.physical_params(&outcome.params).unwrap().primary();

        assert!(l_fixed.is_finite() && l_fixed > 30e-9);
        assert!(rel(l_fixed, 35e-9) > rel(l_free, 35e-9), "{l_fixed:e} vs {l_free:e}");
    }

    #[test]
    fn fjc_peg_recovers_segment_count_and_kuhn_length() {
        let x = x_data();
        let truth = PegChain {
            temperature: T,
            segment_count: 123.0,
            elasticity: 150.0,
            planar_length: 3.58e-10,
            helical_length: 2.8e-10,
            delta_g: 3.0,
            kuhn_length: 7e-10,
        };
        let d = fjc_peg_fn(&x, &truth).unwrap();

        let model = FjcPegFit::new(&x, T, Secondary::Free, PegSettings::default()).unwrap();
        let outcome = ModelFitter::new(&d, true).fit(&model).unwrap();
        let PolymerParams::FjcPeg {
            segment_count,
            kuhn_length,
        } = model.physical_params(&outcome.params).unwrap()
        else {
            panic!("wrong parameter family");
        };
        assert!(rel(segment_count, 123.0) < 0.01, "N = {segment_count}");
        assert!(rel(kuhn_length, 7e-10) < 0.01, "a = {kuhn_length:e}");

        // A Kuhn length fixed at twice the truth still converges, further off.
        let fixed = FjcPegFit::new(&x, T, Secondary::Fixed(1.4e-9), PegSettings::default()).unwrap();
        let outcome = ModelFitter::new(&d, true).fit(&fixed).unwrap();
        let n_fixed = fixed.physical_params(&outcome.params).unwrap().primary();
        assert!(rel(n_fixed, 123.0) > rel(segment_count, 123.0), "N = {n_fixed}");
    }

    #[test]
    fn contour_models_share_reconstruction() {
        let x = x_data();
        let wlc = ContourFit::wlc(&x, T, Secondary::Fixed(4e-10)).unwrap();
        let fjc = ContourFit::fjc(&x, T, Secondary::Fixed(4e-10)).unwrap();
        let u = Reparam::AboveDataMax { x_max: 30e-9 }.forward(35e-9);

        let PolymerParams::Wlc {
            contour_length,
            persistence_length,
        } = wlc.physical_params(&[u]).unwrap()
        else {
            panic!("wrong parameter family");
        };
        assert!(rel(contour_length, 35e-9) < 1e-12);
        assert_eq!(persistence_length, 4e-10);

        assert!(matches!(fjc.physical_params(&[u]).unwrap(), PolymerParams::Fjc { .. }));
        assert_eq!(wlc.model(&[u]).unwrap(), wlc_fn(&x, T, contour_length, 4e-10));
        assert_eq!(fjc.model(&[u]).unwrap(), fjc_fn(&x, T, contour_length, 4e-10).unwrap());
    }

    #[test]
    fn non_finite_reconstruction_is_a_poor_fit() {
        let x = x_data();
        let model = ContourFit::wlc(&x, T, Secondary::Free).unwrap();
        let err = model.physical_params(&[f64::NAN, 1e-10]).unwrap_err();
        assert!(matches!(err, FitError::PoorFit(_)));
    }
}
