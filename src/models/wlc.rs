//! Worm-like chain.
//!
//! The interpolation formula of Bustamante, Marko, Siggia and Smith (1994):
//!
//! ```text
//! F(x) = kB T / p * [ 1/4 ((1 - x/L)^-2 - 1) + x/L ]
//! ```
//!
//! The force diverges as `x -> L`; no guard is applied beyond what IEEE
//! arithmetic gives.

use crate::models::K_B;

/// WLC tension at a single extension.
pub fn wlc_force(x: f64, temperature: f64, contour_length: f64, persistence_length: f64) -> f64 {
    let a = K_B * temperature / persistence_length;
    let scaled = x / contour_length;
    let slack = 1.0 - scaled;
    a * (0.25 * (1.0 / (slack * slack) - 1.0) + scaled)
}

/// WLC tension over a slice of extensions.
pub fn wlc_fn(x: &[f64], temperature: f64, contour_length: f64, persistence_length: f64) -> Vec<f64> {
    x.iter()
        .map(|&xi| wlc_force(xi, temperature, contour_length, persistence_length))
        .collect()
}
