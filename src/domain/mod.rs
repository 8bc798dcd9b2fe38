//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - the model selector (`ModelKind`) and physical configuration (`PolymerSettings`)
//! - recovered parameters (`PolymerParams`)
//! - fit outputs (`FitDiagnostics`, `FitOutcome`, `PolymerFit`)

pub mod types;

pub use types::*;
