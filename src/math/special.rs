//! Hyperbolic cotangent family and the Langevin function.
//!
//! The Langevin function is
//!
//! - `L(z) = coth(z) - 1/z`
//!
//! and is the mean orientation of a freely-jointed segment under a reduced
//! tension `z = F a / (kB T)`. Its inverse has no closed form and is solved
//! per element with Newton-Raphson.
//!
//! Numerical notes:
//! - For small `z`, `coth(z) - 1/z` is a difference of two large numbers and
//!   loses about `log10(3/z^2)` digits. Below `SERIES_Z` we evaluate the
//!   Maclaurin series instead, truncated after the `z^15` term so both
//!   branches agree to a few dozen ulps at the switch.
//! - `L(0) = 0` (removable singularity).
//! - Near `|z| = 1` the inverse diverges; values beyond `extreme` saturate to
//!   `±∞` instead of asking Newton to crawl up an almost flat function.

use crate::error::ConvergenceError;
use crate::math::newton::{NewtonOptions, newton_raphson};

/// Threshold below which we switch to the series.
const SERIES_Z: f64 = 0.3;

/// Maclaurin coefficients of `L(z) / z` in powers of `z^2`.
const LANGEVIN_SERIES: [f64; 8] = [
    1.0 / 3.0,
    -1.0 / 45.0,
    2.0 / 945.0,
    -1.0 / 4725.0,
    2.0 / 93555.0,
    -1382.0 / 638_512_875.0,
    4.0 / 18_243_225.0,
    -3617.0 / 162_820_783_125.0,
];

/// Default saturation bound for [`inverse_langevin`].
pub const DEFAULT_EXTREME: f64 = 1.0 - 1e-8;

/// Hyperbolic cotangent, `1 / tanh(z)`.
///
/// Follows IEEE `tanh`: `coth(±0) = ±∞`, `coth(±∞) = ±1`.
pub fn coth(z: f64) -> f64 {
    1.0 / z.tanh()
}

/// Inverse hyperbolic cotangent, `atanh(1 / z)`.
///
/// Defined for `|z| >= 1`; anything else yields `NaN`, which is propagated.
pub fn arccoth(z: f64) -> f64 {
    (1.0 / z).atanh()
}

/// Langevin function `coth(z) - 1/z`.
pub fn langevin(z: f64) -> f64 {
    if z == 0.0 {
        return 0.0;
    }
    if z.abs() < SERIES_Z {
        return langevin_series(z);
    }
    langevin_direct(z)
}

/// Derivative of the Langevin function, `1/z^2 - 1/sinh^2(z)`.
pub fn langevin_derivative(z: f64) -> f64 {
    if z.abs() < SERIES_Z {
        return langevin_derivative_series(z);
    }
    langevin_derivative_direct(z)
}

fn langevin_series(z: f64) -> f64 {
    let z2 = z * z;
    z * LANGEVIN_SERIES.iter().rev().fold(0.0, |acc, &c| acc * z2 + c)
}

fn langevin_direct(z: f64) -> f64 {
    coth(z) - 1.0 / z
}

fn langevin_derivative_series(z: f64) -> f64 {
    let z2 = z * z;
    LANGEVIN_SERIES
        .iter()
        .enumerate()
        .rev()
        .fold(0.0, |acc, (i, &c)| acc * z2 + (2 * i + 1) as f64 * c)
}

fn langevin_derivative_direct(z: f64) -> f64 {
    let s = z.sinh();
    1.0 / (z * z) - 1.0 / (s * s)
}

/// Absolute rounding noise of [`langevin`] at `x`.
///
/// The direct branch subtracts two terms of size `coth(x)` and `1/x`, so its
/// error scales with their sum rather than with the result.
fn langevin_rounding(x: f64) -> f64 {
    let x = x.abs();
    if x < SERIES_Z {
        f64::EPSILON * langevin_series(x)
    } else {
        f64::EPSILON * (coth(x) + 1.0 / x)
    }
}

/// Inverse Langevin function.
///
/// Returns `+∞` for `z > extreme` and `-∞` for `z < -extreme`. This
/// saturation is deliberate model behavior rather than an error: an FJC
/// evaluated at `x/L` this close to one predicts an infinite force, and the
/// caller sees it as such.
///
/// Otherwise solves `L(x) = z` by Newton-Raphson starting from the truncated
/// series `3z + 9/5 z^3 + 297/175 z^5`. All series coefficients are positive,
/// so for `z > 0` the seed sits left of the root, where `L` is concave, and
/// the iteration approaches monotonically.
pub fn inverse_langevin(z: f64, extreme: f64) -> Result<f64, ConvergenceError> {
    if z.is_nan() {
        return Ok(f64::NAN);
    }
    if z > extreme {
        return Ok(f64::INFINITY);
    }
    if z < -extreme {
        return Ok(f64::NEG_INFINITY);
    }
    if z == 0.0 {
        return Ok(0.0);
    }

    // L is odd: solve for |z| and restore the sign.
    let target = z.abs();
    let t2 = target * target;
    let seed = target * (3.0 + t2 * (9.0 / 5.0 + t2 * 297.0 / 175.0));

    // Near saturation L' ~ 1/x^2 is tiny and rounding noise in L(x) moves the
    // Newton step by many ulps, so also accept a residual at the noise level
    // of the evaluation itself.
    let opts = NewtonOptions {
        f_tol: 16.0 * langevin_rounding(seed),
        ..NewtonOptions::default()
    };
    let root = newton_raphson(|x| langevin(x) - target, langevin_derivative, seed, &opts)?;
    log::trace!("inverse_langevin({z}) = {root} (seed {seed})");

    Ok(root.copysign(z))
}

/// Element-wise [`inverse_langevin`] with the default saturation bound.
///
/// Each element is an independent scalar solve.
pub fn inverse_langevin_slice(z: &[f64]) -> Result<Vec<f64>, ConvergenceError> {
    z.iter()
        .map(|&zi| inverse_langevin(zi, DEFAULT_EXTREME))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coth_matches_known_values() {
        assert!((coth(1.19967874) - 1.199678).abs() < 1e-6);
        assert_eq!(coth(0.0), f64::INFINITY);
        assert_eq!(coth(-0.0), f64::NEG_INFINITY);
        assert_eq!(coth(f64::INFINITY), 1.0);
        assert_eq!(coth(f64::NEG_INFINITY), -1.0);
    }

    #[test]
    fn arccoth_inverts_coth() {
        assert!((arccoth(1.19967874) - 1.199678).abs() < 1e-6);
        let pi = std::f64::consts::PI;
        assert!((arccoth(coth(pi)) - pi).abs() < 1e-9);
        assert!(arccoth(0.5).is_nan());
    }

    #[test]
    fn langevin_known_value_and_zero() {
        let v = langevin(std::f64::consts::PI);
        assert!((v - 0.685).abs() < 1e-3, "L(pi) should be ~0.685, got {v}");
        assert_eq!(langevin(0.0), 0.0);
    }

    #[test]
    fn langevin_series_is_continuous_at_switch() {
        for z in [SERIES_Z, -SERIES_Z] {
            let series = langevin_series(z);
            let direct = langevin_direct(z);
            assert!((series - direct).abs() < 1e-12, "z={z}: {series} vs {direct}");

            let d_series = langevin_derivative_series(z);
            let d_direct = langevin_derivative_direct(z);
            assert!((d_series - d_direct).abs() < 1e-9, "z={z}: {d_series} vs {d_direct}");
        }
    }

    #[test]
    fn langevin_is_accurate_just_above_switch() {
        // coth(z) - 1/z loses about six digits here.
        let z: f64 = 1.5e-3;
        let expected = z / 3.0 - z.powi(3) / 45.0 + 2.0 * z.powi(5) / 945.0;
        assert!((langevin(z) - expected).abs() < 1e-15 * expected);
        let d_expected = 1.0 / 3.0 - z * z / 15.0 + 2.0 * z.powi(4) / 189.0;
        assert!((langevin_derivative(z) - d_expected).abs() < 1e-15);
    }

    #[test]
    fn langevin_derivative_matches_finite_difference() {
        for &z in &[0.01, 0.5, 2.0, 7.5, 40.0] {
            let h = 1e-6 * z;
            let fd = (langevin(z + h) - langevin(z - h)) / (2.0 * h);
            let d = langevin_derivative(z);
            assert!((fd - d).abs() < 1e-6 * d.abs().max(1e-6), "z={z}: {fd} vs {d}");
        }
    }

    #[test]
    fn inverse_langevin_round_trips() {
        for &z in &[1e-6, 0.01, 0.3, 1.0, 2.0, 3.0, std::f64::consts::PI, 50.0, 1e4, -0.7, -25.0] {
            let back = inverse_langevin(langevin(z), DEFAULT_EXTREME).unwrap();
            assert!(
                (back - z).abs() < 1e-6 * z.abs(),
                "inverse_langevin(L({z})) = {back}"
            );
        }
    }

    #[test]
    fn inverse_langevin_saturates() {
        assert_eq!(inverse_langevin(1.0, DEFAULT_EXTREME).unwrap(), f64::INFINITY);
        assert_eq!(inverse_langevin(-1.0, DEFAULT_EXTREME).unwrap(), f64::NEG_INFINITY);
        assert_eq!(inverse_langevin(0.5, 0.4).unwrap(), f64::INFINITY);
        assert_eq!(inverse_langevin(0.0, DEFAULT_EXTREME).unwrap(), 0.0);
        assert!(inverse_langevin(f64::NAN, DEFAULT_EXTREME).unwrap().is_nan());
    }

    #[test]
    fn inverse_langevin_sweeps_below_one() {
        for i in 0..=400 {
            let z = 1e-6 * 1e6f64.powf(i as f64 / 400.0) * 0.999;
            let x = inverse_langevin(z, DEFAULT_EXTREME)
                .unwrap_or_else(|e| panic!("inverse_langevin({z}) failed: {e}"));
            assert!(x.is_finite() && x > 0.0, "inverse_langevin({z}) = {x}");
            let back = langevin(x);
            assert!((back - z).abs() <= 1e-12 * z, "L(inverse_langevin({z})) = {back}");
        }
        for k in 1..=8 {
            let z = 1.0 - 10f64.powi(-k);
            let x = inverse_langevin(z, DEFAULT_EXTREME).unwrap();
            assert!(x.is_finite(), "inverse_langevin(1 - 1e-{k}) = {x}");
        }
    }

    #[test]
    fn inverse_langevin_saturates_consistently_near_one() {
        // L(x) ~ 1 - 1/x for large x.
        let x = inverse_langevin(1.0 - 1e-6, DEFAULT_EXTREME).unwrap();
        assert!((x - 1e6).abs() < 1e-6 * 1e6, "got {x}");
        let neg = inverse_langevin(-(1.0 - 1e-6), DEFAULT_EXTREME).unwrap();
        assert_eq!(neg, -x);

        let above = DEFAULT_EXTREME + 1e-12;
        assert_eq!(inverse_langevin(above, DEFAULT_EXTREME).unwrap(), f64::INFINITY);
        assert_eq!(inverse_langevin(-above, DEFAULT_EXTREME).unwrap(), f64::NEG_INFINITY);

        assert_eq!(langevin(1e9), 1.0 - 1e-9);
        assert_eq!(inverse_langevin(langevin(1e9), DEFAULT_EXTREME).unwrap(), f64::INFINITY);
        assert_eq!(langevin(1e300), 1.0);
    }

    #[test]
    fn inverse_langevin_slice_solves_each_element() {
        let z: Vec<f64> = [1.0, 2.0, 3.0].iter().map(|&v| langevin(v)).collect();
        let out = inverse_langevin_slice(&z).unwrap();
        for (got, want) in out.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-9);
        }
    }
}
