//! Polymer fit dispatcher.
//!
//! `PolymerFitter` resolves the model once (by [`ModelKind`] or by name) and
//! then fits any number of data segments:
//!
//! - `fit`: synchronous, returns the tension over the whole segment (zero outside
//!   `[start, stop)`), the physical parameters and the diagnostics
//! - `fit_reporting`: same, also publishing the diagnostics to a handoff slot
//! - `spawn`: one fit on a worker thread, diagnostics collected via the slot
//! - `fit_batch`: many independent segments in parallel (rayon), order preserved

use std::thread::JoinHandle;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::{FitDiagnostics, ModelKind, PolymerFit, PolymerSettings};
use crate::error::FitError;
use crate::fit::adapters::{ContourFit, FjcPegFit, PolymerAdapter, Secondary};
use crate::fit::fitter::ModelFitter;
use crate::fit::handoff::{DiagnosticsReceiver, DiagnosticsSender, diagnostics_slot};
use crate::math::LmOptions;

/// A configured polymer model, ready to fit data segments.
#[derive(Debug, Clone)]
pub struct PolymerFitter {
    kind: ModelKind,
    settings: PolymerSettings,
    options: LmOptions,
    rescale: bool,
}

impl PolymerFitter {
    pub fn new(kind: ModelKind, settings: PolymerSettings) -> Self {
        Self {
            kind,
            settings,
            options: LmOptions::default(),
            rescale: true,
        }
    }

    /// # Errors
    /// [`FitError::UnknownModel`] unless `name` is `WLC`, `FJC` or `FJC-PEG`.
    pub fn from_name(name: &str, settings: PolymerSettings) -> Result<Self, FitError> {
        Ok(Self::new(name.parse()?, settings))
    }

    pub fn with_options(mut self, options: LmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn settings(&self) -> &PolymerSettings {
        &self.settings
    }

    fn adapter<'a>(&self, x: &'a [f64]) -> Result<Box<dyn PolymerAdapter + 'a>, FitError> {
        let t = self.settings.temperature;
        let secondary = Secondary::from_setting(self.settings.secondary_length(self.kind));
        Ok(match self.kind {
            ModelKind::Wlc => Box::new(ContourFit::wlc(x, t, secondary)?),
            ModelKind::Fjc => Box::new(ContourFit::fjc(x, t, secondary)?),
            ModelKind::FjcPeg => Box::new(FjcPegFit::new(x, t, secondary, self.settings.peg)?),
        })
    }

    /// Fit `y[start..stop]` against `x[start..stop]`.
    ///
    /// The returned tension has `x.len()` entries; those outside the window are
    /// zero and the model is never evaluated there.
    pub fn fit(&self, x: &[f64], y: &[f64], start: usize, stop: usize) -> Result<PolymerFit, FitError> {
        self.run(x, y, start, stop, None)
    }

    /// [`fit`](Self::fit), publishing the diagnostics record to `sender`.
    pub fn fit_reporting(
        &self,
        x: &[f64],
        y: &[f64],
        start: usize,
        stop: usize,
        sender: &DiagnosticsSender,
    ) -> Result<PolymerFit, FitError> {
        self.run(x, y, start, stop, Some(sender))
    }

    /// Run one fit on a new thread.
    pub fn spawn(&self, x: Vec<f64>, y: Vec<f64>, start: usize, stop: usize) -> FitWorker {
        let (tx, rx) = diagnostics_slot();
        let fitter = self.clone();
        let handle = std::thread::spawn(move || fitter.fit_reporting(&x, &y, start, stop, &tx));
        FitWorker {
            handle,
            diagnostics: rx,
        }
    }

    fn run(
        &self,
        x: &[f64],
        y: &[f64],
        start: usize,
        stop: usize,
        sender: Option<&DiagnosticsSender>,
    ) -> Result<PolymerFit, FitError> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch { x: x.len(), y: y.len() });
        }
        if start >= stop || stop > x.len() {
            return Err(FitError::InvalidWindow {
                start,
                stop,
                len: x.len(),
            });
        }

        let x_win = &x[start..stop];
        let y_win = &y[start..stop];
        let adapter = self.adapter(x_win)?;
        let fitter = ModelFitter::new(y_win, self.rescale)
            .with_options(self.options)
            .with_noise_sigma(self.settings.noise_sigma);

        let outcome = match sender {
            Some(sender) => fitter.fit_reporting(adapter.as_ref(), sender)?,
            None => fitter.fit(adapter.as_ref())?,
        };
        let params = adapter.physical_params(&outcome.params)?;
        let predicted = adapter.model(&outcome.params)?;

        let mut tension = vec![0.0; x.len()];
        tension[start..stop].copy_from_slice(&predicted);
        log::debug!("{} fit on [{start}, {stop}): {params:?}", self.kind);

        Ok(PolymerFit {
            model: self.kind,
            tension,
            params,
            diagnostics: outcome.diagnostics,
        })
    }
}

/// `fit(model_name, x, y, start, stop, fixed_params)` in one call.
pub fn fit_polymer_model(
    name: &str,
    x: &[f64],
    y: &[f64],
    start: usize,
    stop: usize,
    settings: &PolymerSettings,
) -> Result<PolymerFit, FitError> {
    PolymerFitter::from_name(name, *settings)?.fit(x, y, start, stop)
}

/// A fit running on its own thread.
#[derive(Debug)]
pub struct FitWorker {
    handle: JoinHandle<Result<PolymerFit, FitError>>,
    diagnostics: DiagnosticsReceiver,
}

impl FitWorker {
    /// Non-blocking; `None` until the fit has succeeded, and after the record was taken.
    pub fn try_diagnostics(&self) -> Option<FitDiagnostics> {
        self.diagnostics.try_take()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the fit. The receiver still holds the diagnostics record unless
    /// it was already taken.
    ///
    /// A panic on the worker thread comes back as [`FitError::WorkerPanicked`],
    /// never as a fit-quality verdict.
    pub fn join(self) -> (Result<PolymerFit, FitError>, DiagnosticsReceiver) {
        let result = self.handle.join().unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());
            log::error!("fit worker panicked: {message}");
            Err(FitError::WorkerPanicked(message))
        });
        (result, self.diagnostics)
    }
}

/// One data segment of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitJob {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub start: usize,
    pub stop: usize,
}

/// Fit every job in parallel; results come back in job order.
pub fn fit_batch(fitter: &PolymerFitter, jobs: &[FitJob]) -> Vec<Result<PolymerFit, FitError>> {
    jobs.par_iter()
        .map(|job| fitter.fit(&job.x, &job.y, job.start, job.stop))
        .collect()
}
