//! `polymer-fit` library crate.
//!
//! Force-extension models for single-molecule pulling experiments (WLC, FJC,
//! FJC-PEG) and a Levenberg-Marquardt fitter for them. The `pfit` binary is a
//! thin wrapper so everything here is testable without spawning processes.
//!
//! The one-call entry point is [`fit::fit_polymer_model`].

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
