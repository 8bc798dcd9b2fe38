//! Input/output helpers.
//!
//! - curve JSON read/write (`curve`)
//! - fit result exports (JSON/CSV) (`export`)

pub mod curve;
pub mod export;

pub use curve::*;
pub use export::*;
