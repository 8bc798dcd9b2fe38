//! Numerical building blocks: special functions, root finding and least-squares settings.

pub mod lm;
pub mod newton;
pub mod special;

pub use lm::*;
pub use newton::*;
pub use special::*;
