//! Reparametrizations that keep the optimizer inside the physical domain.
//!
//! - `AboveDataMax`: `u = ln(L / x_max - 1)`, `L = (e^u + 1) x_max`, so every
//!   real `u` gives `L > x_max`. Contour lengths at or below `x_max` map to
//!   `-∞` / `NaN`; the optimizer never proposes them.
//! - `Positive`: `u = ln(N / x_max)`, `N = e^u x_max`, so every real `u`
//!   gives `N > 0`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Reparam {
    /// Contour lengths strictly longer than the largest extension.
    AboveDataMax { x_max: f64 },
    /// Strictly positive counts.
    Positive { x_max: f64 },
}

impl Reparam {
    /// Physical value to optimizer coordinate.
    pub fn forward(self, value: f64) -> f64 {
        match self {
            Reparam::AboveDataMax { x_max } => (value / x_max - 1.0).ln(),
            Reparam::Positive { x_max } => (value / x_max).ln(),
        }
    }

    /// Optimizer coordinate to physical value.
    pub fn inverse(self, u: f64) -> f64 {
        match self {
            Reparam::AboveDataMax { x_max } => (u.exp() + 1.0) * x_max,
            Reparam::Positive { x_max } => u.exp() * x_max,
        }
    }
}
