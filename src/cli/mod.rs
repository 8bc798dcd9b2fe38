//! Command-line parsing for the polymer fitter.
//!
//! Argument parsing and command dispatch stay here, away from the models and
//! the fitting code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{DEFAULT_SECONDARY_LENGTH, ModelKind, PolymerSettings};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pfit", version, about = "AFM polymer force-extension fitter (WLC, FJC, FJC-PEG)")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Simulate one curve, fit it and report parameter recovery.
    Simulate(SimulateArgs),
    /// Fit a curve stored in a curve JSON file.
    Fit(FitArgs),
    /// Simulate many noisy curves from one truth and fit them in parallel.
    Batch(BatchArgs),
}

/// Shape of a synthetic curve.
#[derive(Debug, Args, Clone)]
pub struct CurveArgs {
    /// Polymer model used to draw (and fit) the curve.
    #[arg(short = 'm', long, value_enum, default_value_t = ModelKind::Wlc)]
    pub model: ModelKind,

    /// True contour length (m) or, for fjc-peg, segment count.
    /// Defaults: 35e-9 m, or 123 segments.
    #[arg(long)]
    pub primary: Option<f64>,

    /// True persistence/Kuhn length (m).
    /// Defaults to the length the fit holds fixed, or 4e-10 m with --free.
    #[arg(long)]
    pub secondary: Option<f64>,

    /// Smallest stretched extension (m).
    #[arg(long, default_value_t = 10e-9)]
    pub x_min: f64,

    /// Largest stretched extension (m).
    #[arg(long, default_value_t = 30e-9)]
    pub x_max: f64,

    /// Samples in the stretched region (the fit window).
    #[arg(short = 'n', long, default_value_t = 20)]
    pub points: usize,

    /// Slack samples before the fit window.
    #[arg(long, default_value_t = 5)]
    pub baseline_points: usize,

    /// Force noise standard deviation (N).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Physical settings shared by every command that fits.
#[derive(Debug, Args, Clone)]
pub struct ChainArgs {
    /// Fit the persistence/Kuhn length instead of holding it fixed.
    #[arg(long, conflicts_with = "secondary_length")]
    pub free: bool,

    /// Hold the persistence/Kuhn length at this value (m).
    #[arg(long)]
    pub secondary_length: Option<f64>,

    /// Temperature (K). Overrides PFIT_TEMPERATURE.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Cap on solver iterations.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,
}

/// Output options for single-curve commands.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Show the top-N residuals by magnitude.
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Export the fit (parameters, tension, diagnostics) to JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export per-point residuals to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub curve: CurveArgs,

    #[command(flatten)]
    pub chain: ChainArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Save the simulated curve to JSON (readable by `pfit fit`).
    #[arg(long = "save-curve")]
    pub save_curve: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Curve JSON file produced by `pfit simulate --save-curve`.
    #[arg(long, short = 'i', value_name = "JSON")]
    pub input: PathBuf,

    /// Model to fit; defaults to the model recorded in the curve file.
    #[arg(short = 'm', long, value_enum)]
    pub model: Option<ModelKind>,

    #[command(flatten)]
    pub chain: ChainArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub curve: CurveArgs,

    #[command(flatten)]
    pub chain: ChainArgs,

    /// Number of curves (seeds `seed .. seed + count`).
    #[arg(long, default_value_t = 32)]
    pub count: usize,
}

impl CurveArgs {
    /// Truth `(primary, secondary)` with per-model defaults filled in.
    ///
    /// An unset secondary length follows what `settings` holds fixed for the
    /// model, so the default curve is drawn from the chain the fit assumes.
    pub fn truth(&self, settings: &PolymerSettings) -> (f64, f64) {
        let primary = match self.model {
            ModelKind::Wlc | ModelKind::Fjc => 35e-9,
            ModelKind::FjcPeg => 123.0,
        };
        let secondary = settings
            .secondary_length(self.model)
            .unwrap_or(DEFAULT_SECONDARY_LENGTH);
        (self.primary.unwrap_or(primary), self.secondary.unwrap_or(secondary))
    }
}
