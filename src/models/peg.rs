//! Poly(ethylene-glycol) adjusted extended FJC.
//!
//! Oesterhelt, Rief and Gaub (1999) model each PEG segment as a two-state
//! (planar `ttt` / helical `ttg`) unit on a freely-jointed, elastic chain. The
//! inverse form is closed:
//!
//! ```text
//! x(F) = N [ (Lp / (e^g + 1) + Lh / (e^-g + 1)) (coth(z) - 1/z) + F / k ]
//! g    = ΔG - F (Lp - Lh) / (kB T)        (ΔG in units of kB T)
//! z    = F a / (kB T)
//! ```
//!
//! `g` is the free energy of the planar state relative to the helical one at
//! tension `F`, so the planar fraction is `1 / (e^g + 1)`. With `ΔG > 0` the
//! relaxed chain is mostly helical and tension pulls it into the longer planar
//! state, which keeps `x(F)` increasing.
//!
//! `F(x)` has no closed form. We seed it with a plain FJC estimate and solve
//! `x(guess * f) = x` for the multiplier `f` with the secant method.

use serde::{Deserialize, Serialize};

use crate::error::ConvergenceError;
use crate::math::{NewtonOptions, langevin, secant};
use crate::models::{K_B, fjc_force};

/// Cap on contour-length doublings while looking for a finite FJC seed.
const MAX_SEED_DOUBLINGS: usize = 64;

/// Every parameter of an FJC-PEG chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PegChain {
    /// Kelvin.
    pub temperature: f64,
    /// Number of segments (dimensionless, need not be an integer in a fit).
    pub segment_count: f64,
    /// Segment elasticity in N/m.
    pub elasticity: f64,
    /// Segment contour length in the planar (ttt) state, meters.
    pub planar_length: f64,
    /// Segment contour length in the helical (ttg) state, meters.
    pub helical_length: f64,
    /// Gibbs free energy difference `G_planar - G_helical` in units of kB T.
    pub delta_g: f64,
    /// Kuhn length, meters.
    pub kuhn_length: f64,
}

/// Extension of an FJC-PEG chain at tension `force`.
pub fn inverse_fjc_peg_force(force: f64, chain: &PegChain) -> f64 {
    let kbt = K_B * chain.temperature;
    let g = chain.delta_g - force * (chain.planar_length - chain.helical_length) / kbt;
    let z = force * chain.kuhn_length / kbt;
    let segment = chain.planar_length / (g.exp() + 1.0) + chain.helical_length / ((-g).exp() + 1.0);
    chain.segment_count * (segment * langevin(z) + force / chain.elasticity)
}

/// [`inverse_fjc_peg_force`] over a slice of tensions.
pub fn inverse_fjc_peg_fn(force: &[f64], chain: &PegChain) -> Vec<f64> {
    force.iter().map(|&f| inverse_fjc_peg_force(f, chain)).collect()
}

/// Tension of an FJC-PEG chain at extension `x`.
///
/// `x == 0` returns exactly zero without running the solver.
pub fn fjc_peg_force(x: f64, chain: &PegChain) -> Result<f64, ConvergenceError> {
    if x == 0.0 {
        return Ok(0.0);
    }

    // An FJC of contour length N * max(Lp, Lh) may be too short to reach x;
    // double it until the FJC force is finite.
    let mut contour = chain.segment_count * chain.planar_length.max(chain.helical_length);
    let mut guess = f64::INFINITY;
    for _ in 0..MAX_SEED_DOUBLINGS {
        guess = fjc_force(x, chain.temperature, contour, chain.kuhn_length)?;
        if guess.is_finite() {
            break;
        }
        contour *= 2.0;
    }
    if !guess.is_finite() || guess == 0.0 {
        return Err(ConvergenceError::NonFinite);
    }

    let opts = NewtonOptions {
        rel_tol: 1e-12,
        ..NewtonOptions::default()
    };
    let f = secant(
        |f| inverse_fjc_peg_force(guess * f.abs(), chain) - x,
        1.0,
        &opts,
    )?;
    log::trace!("fjc_peg_force({x:e}): FJC seed {guess:e}, multiplier {f}");

    Ok(guess * f.abs())
}

/// [`fjc_peg_force`] over a slice of extensions, one independent solve per element.
pub fn fjc_peg_fn(x: &[f64], chain: &PegChain) -> Result<Vec<f64>, ConvergenceError> {
    x.iter().map(|&xi| fjc_peg_force(xi, chain)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(segment_count: f64) -> PegChain {
        PegChain {
            temperature: 300.0,
            segment_count,
            elasticity: 150.0,
            planar_length: 3.58e-10,
            helical_length: 2.8e-10,
            delta_g: 3.0,
            kuhn_length: 7e-10,
        }
    }

    #[test]
    fn inverse_is_zero_at_zero_force() {
        assert_eq!(inverse_fjc_peg_force(0.0, &chain(1.0)), 0.0);
    }

    #[test]
    fn inverse_matches_hand_computation() {
        let c = chain(1.0);
        let f = 200e-12;
        let kbt = K_B * 300.0;
        let g = 3.0 - f * (3.58e-10 - 2.8e-10) / kbt;
        let z = f * 7e-10 / kbt;
        let seg = 3.58e-10 / (g.exp() + 1.0) + 2.8e-10 / ((-g).exp() + 1.0);
        let want = seg * (1.0 / z.tanh() - 1.0 / z) + f / 150.0;
        let got = inverse_fjc_peg_force(f, &c);
        assert!((got - want).abs() < 1e-12 * want, "got {got:e}, want {want:e}");
    }

    #[test]
    fn tension_favours_planar_state() {
        let c = chain(1.0);
        let kbt = K_B * 300.0;
        // Relaxed: ΔG = 3 kBT leaves about 95% of segments helical.
        let low = inverse_fjc_peg_force(1e-15, &c) - 1e-15 / 150.0;
        let z = 1e-15 * 7e-10 / kbt;
        let relaxed_segment = low / langevin(z);
        let helical_weight = 1.0 / ((-3.0f64).exp() + 1.0);
        let expected = 3.58e-10 * (1.0 - helical_weight) + 2.8e-10 * helical_weight;
        assert!((relaxed_segment - expected).abs() < 1e-6 * expected);

        // At 500 pN g is strongly negative and the segment is almost all planar.
        let f = 500e-12;
        let segment = (inverse_fjc_peg_force(f, &c) - f / 150.0) / langevin(f * 7e-10 / kbt);
        assert!((segment - 3.58e-10).abs() < 1e-3 * 3.58e-10, "segment {segment:e}");
    }

    #[test]
    fn forward_inverts_closed_form() {
        let mut forces = vec![1e-12, 1e-11, 3e-11, 1e-10, 2e-10, 3.4e-10, 5e-10];
        forces.extend((0..=40).map(|i| 10e-12 * 50f64.powf(i as f64 / 40.0)));
        for n in [1.0, 123.0] {
            let c = chain(n);
            for &f in &forces {
                let x = inverse_fjc_peg_force(f, &c);
                let back = fjc_peg_force(x, &c).unwrap();
                assert!((back - f).abs() < 1e-8 * f, "N={n}, F={f:e}: got {back:e}");
            }
        }
    }

    #[test]
    fn extension_is_increasing_in_force() {
        let c = chain(123.0);
        let x: Vec<f64> = [10e-12, 100e-12, 500e-12]
            .iter()
            .map(|&f| inverse_fjc_peg_force(f, &c))
            .collect();
        assert!(x[0] < x[1] && x[1] < x[2], "{x:?}");
        assert!((x[2] - 43.9e-9).abs() < 0.1e-9, "x(500 pN) = {:e}", x[2]);
    }

    #[test]
    fn forward_handles_short_extension() {
        let f = fjc_peg_fn(&[1e-10], &chain(123.0)).unwrap();
        assert!(f[0].is_finite() && f[0] > 0.0, "got {:e}", f[0]);
    }

    #[test]
    fn forward_passes_zero_through() {
        assert_eq!(fjc_peg_force(0.0, &chain(123.0)).unwrap(), 0.0);
        let out = fjc_peg_fn(&[0.0, 1e-8], &chain(123.0)).unwrap();
        assert_eq!(out[0], 0.0);
        assert!(out[1] > 0.0);
    }

    #[test]
    fn forward_is_increasing_for_long_chain() {
        let x: Vec<f64> = (1..=20).map(|i| 1.5e-9 * i as f64).collect();
        let f = fjc_peg_fn(&x, &chain(123.0)).unwrap();
        assert!(f.iter().all(|v| v.is_finite() && *v > 0.0));
        for w in f.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn forward_reaches_past_rigid_contour() {
        // Beyond N * Lp only segment elasticity can supply extension, so the
        // FJC seed needs longer trial contours and the force is large.
        let c = PegChain {
            delta_g: 30.0,
            ..chain(10.0)
        };
        let x = 10.0 * 3.58e-10 * 1.01;
        let f = fjc_peg_force(x, &c).unwrap();
        assert!(f.is_finite() && f > 1e-10, "got {f:e}");
        let back = inverse_fjc_peg_force(f, &c);
        assert!((back - x).abs() < 1e-9 * x);
    }
}
