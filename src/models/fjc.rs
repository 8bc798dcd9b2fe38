//! Freely-jointed chain.
//!
//! ```text
//! F(x) = kB T / a * Linv(x / L)
//! ```
//!
//! with `Linv` the inverse Langevin function (Hatfield & Quake 1999). For
//! `x/L` within `1e-8` of one the inverse saturates and the force is `±∞`.

use crate::error::ConvergenceError;
use crate::math::{DEFAULT_EXTREME, inverse_langevin};
use crate::models::K_B;

/// FJC tension at a single extension.
pub fn fjc_force(
    x: f64,
    temperature: f64,
    contour_length: f64,
    kuhn_length: f64,
) -> Result<f64, ConvergenceError> {
    let z = inverse_langevin(x / contour_length, DEFAULT_EXTREME)?;
    Ok(K_B * temperature / kuhn_length * z)
}

/// FJC tension over a slice of extensions.
pub fn fjc_fn(
    x: &[f64],
    temperature: f64,
    contour_length: f64,
    kuhn_length: f64,
) -> Result<Vec<f64>, ConvergenceError> {
    x.iter()
        .map(|&xi| fjc_force(xi, temperature, contour_length, kuhn_length))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fjc_known_values() {
        let f = fjc_fn(&[1e-9, 5e-9, 10e-9], 300.0, 15e-9, 2.5e-10).unwrap();
        let want = [3.322e-12, 1.78e-11, 4.889e-11];
        for (got, want) in f.iter().zip(want) {
            assert!((got - want).abs() < 2e-3 * want, "got {got:e}, want {want:e}");
        }
    }

    #[test]
    fn fjc_is_finite_positive_and_increasing_inside_contour() {
        let (t, l, a) = (300.0, 35e-9, 2.5e-10);
        let x: Vec<f64> = (1..100).map(|i| l * i as f64 / 100.0).collect();
        let f = fjc_fn(&x, t, l, a).unwrap();
        assert!(f.iter().all(|v| v.is_finite() && *v > 0.0));
        for w in f.windows(2) {
            assert!(w[1] > w[0], "FJC force must increase with extension");
        }
    }

    #[test]
    fn fjc_is_linear_at_short_extension() {
        // Entropic spring: F ~ 3 kB T x / (L a) for x << L.
        let (t, l, a) = (300.0, 35e-9, 2.5e-10);
        let x: Vec<f64> = (1..=10).map(|i| 1e-10 * i as f64).collect();
        let f = fjc_fn(&x, t, l, a).unwrap();
        for (xi, fi) in x.iter().zip(&f) {
            let spring = 3.0 * K_B * t * xi / (l * a);
            assert!(fi.is_finite() && *fi > 0.0, "x={xi:e}: {fi:e}");
            assert!((fi - spring).abs() < 1e-3 * spring, "x={xi:e}: {fi:e} vs {spring:e}");
        }
    }

    #[test]
    fn fjc_saturates_at_contour_length() {
        assert_eq!(fjc_force(35e-9, 300.0, 35e-9, 2.5e-10).unwrap(), f64::INFINITY);
        assert_eq!(fjc_force(0.0, 300.0, 35e-9, 2.5e-10).unwrap(), 0.0);
    }
}
