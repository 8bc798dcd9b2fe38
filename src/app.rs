//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module parses arguments, builds settings
//! (defaults, then `PFIT_*` environment, then flags), runs the pipeline and
//! writes reports and exports.

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record};

use crate::cli::{BatchArgs, ChainArgs, Command, CurveArgs, FitArgs, OutputArgs, SimulateArgs};
use crate::data::CurveSpec;
use crate::domain::{ModelKind, PolymerSettings};
use crate::error::AppError;
use crate::fit::PolymerFitter;
use crate::io::{CurveFile, FitExport, read_curve_json, write_curve_json, write_fit_json, write_residuals_csv};
use crate::math::LmOptions;
use crate::report::{format_batch_summary, format_fit_summary, format_residual_table, largest_residuals};

pub mod pipeline;

/// Entry point for the `pfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let mut settings = settings_from_args(args.curve.model, &args.chain)?;
    let spec = curve_spec(&args.curve, &settings);
    if settings.noise_sigma.is_none() && spec.noise_sigma > 0.0 {
        settings.noise_sigma = Some(spec.noise_sigma);
    }
    let fitter = fitter_from_args(args.curve.model, settings, &args.chain);

    let (curve, run) = pipeline::run_simulation(&spec, &fitter)?;
    if let Some(path) = &args.save_curve {
        write_curve_json(path, &CurveFile::from_synthetic(&curve))?;
        log::info!("saved curve to {}", path.display());
    }

    print_curve_run(&run, &settings, &args.output)
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let curve = read_curve_json(&args.input)?;
    let kind = args.model.or(curve.model).ok_or_else(|| {
        AppError::new(2, "The curve file records no model; pass --model.")
    })?;
    let settings = settings_from_args(kind, &args.chain)?;
    let fitter = fitter_from_args(kind, settings, &args.chain);

    let run = pipeline::run_curve_file(&curve, &fitter)?;
    print_curve_run(&run, &settings, &args.output)
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let settings = settings_from_args(args.curve.model, &args.chain)?;
    let spec = curve_spec(&args.curve, &settings);
    let fitter = fitter_from_args(args.curve.model, settings, &args.chain);

    let run = pipeline::run_batch(&spec, &fitter, args.count)?;
    println!("{}", format_batch_summary(args.curve.model, &run.truth, &run.summary));
    Ok(())
}

fn print_curve_run(run: &pipeline::CurveRun, settings: &PolymerSettings, output: &OutputArgs) -> Result<(), AppError> {
    println!("{}", format_fit_summary(&run.fit, settings, run.truth.as_ref()));
    if output.top > 0 {
        println!("Largest residuals:");
        println!("{}", format_residual_table(&largest_residuals(&run.residuals, output.top)));
    }

    if let Some(path) = &output.export {
        let export = FitExport {
            tool: "pfit",
            settings,
            fit: &run.fit,
            truth: run.truth.as_ref(),
        };
        write_fit_json(path, &export)?;
    }
    if let Some(path) = &output.export_csv {
        write_residuals_csv(path, &run.residuals)?;
    }
    Ok(())
}

fn curve_spec(args: &CurveArgs, settings: &PolymerSettings) -> CurveSpec {
    let (primary, secondary) = args.truth(settings);
    CurveSpec {
        model: args.model,
        primary,
        secondary,
        x_min: args.x_min,
        x_max: args.x_max,
        points: args.points,
        baseline_points: args.baseline_points,
        noise_sigma: args.noise,
        seed: args.seed,
    }
}

/// Environment settings with the command-line overrides applied.
pub fn settings_from_args(kind: ModelKind, args: &ChainArgs) -> Result<PolymerSettings, AppError> {
    let mut settings = PolymerSettings::from_env()?;
    if let Some(t) = args.temperature {
        settings.temperature = t;
    }
    if args.free {
        settings = settings.with_secondary_length(kind, None);
    } else if let Some(v) = args.secondary_length {
        settings = settings.with_secondary_length(kind, Some(v));
    }
    settings.validate()?;
    Ok(settings)
}

fn fitter_from_args(kind: ModelKind, settings: PolymerSettings, args: &ChainArgs) -> PolymerFitter {
    PolymerFitter::new(kind, settings).with_options(LmOptions {
        max_iterations: args.max_iterations,
        ..LmOptions::default()
    })
}

/// Plain stderr logger; `-v` raises the level from warn.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // A second call (e.g. from tests) leaves the first logger in place.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
