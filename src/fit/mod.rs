//! Polymer fitting.
//!
//! Responsibilities:
//!
//! - keep the optimizer inside the physical domain (`reparam`)
//! - fit any `FitModel` to a data vector (`fitter`)
//! - hand diagnostics to another thread (`handoff`)
//! - bind WLC / FJC / FJC-PEG to the fitter (`adapters`)
//! - dispatch by model and mask the returned tension (`polymer`)

pub mod adapters;
pub mod fitter;
pub mod handoff;
pub mod polymer;
pub mod reparam;

pub use adapters::*;
pub use fitter::*;
pub use handoff::*;
pub use polymer::*;
pub use reparam::*;
