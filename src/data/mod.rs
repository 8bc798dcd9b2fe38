//! Data sources for the `pfit` binary.

pub mod sample;

pub use sample::*;
