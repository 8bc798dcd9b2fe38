//! Polymer elasticity models.
//!
//! Each model maps extension to tension, `F(x)`, in SI units (meters in,
//! Newtons out). Models are small pure functions so the fit adapters can stay
//! generic.
//!
//! - WLC: closed form
//! - FJC: closed form around the inverse Langevin function
//! - FJC-PEG: only `x(F)` is closed form; `F(x)` is a per-point root solve

pub mod fjc;
pub mod peg;
pub mod wlc;

pub use fjc::*;
pub use peg::*;
pub use wlc::*;

/// Boltzmann constant in J/K.
pub const K_B: f64 = 1.3806503e-23;
